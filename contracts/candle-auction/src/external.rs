use concordium_std::*;

/// Type of the parameter to the `init` function.
#[derive(Debug, Clone, Serialize, SchemaType)]
pub struct InitParameter {
    /// How long bids are accepted, counted from the slot time of `init`.
    pub bidding_duration: Duration,
    /// A new bid must exceed the highest bid by more than this amount.
    pub min_increment: Amount,
}

/// Auction summary returned by the `view` function.
#[derive(Debug, Serialize, SchemaType, PartialEq, Eq)]
pub struct AuctionView {
    pub owner: AccountAddress,
    pub highest_bid: Amount,
    pub highest_bidder: Option<AccountAddress>,
    pub ended: bool,
    pub canceled: bool,
    /// Earliest slot time at which the owner may end the auction.
    pub end_time: Timestamp,
    pub min_increment: Amount,
}
