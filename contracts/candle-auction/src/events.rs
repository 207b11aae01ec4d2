use commons::{
    AUCTION_CANCELED_TAG, AUCTION_CREATED_TAG, AUCTION_ENDED_TAG, NEW_HIGHEST_BID_TAG,
    WITHDRAWAL_TAG,
};
use concordium_std::*;

/// Auction creation event data.
#[derive(Debug, Serialize, SchemaType, PartialEq, Eq)]
pub struct AuctionCreatedEvent {
    /// Auction owner.
    pub owner: AccountAddress,
    /// Slot time from which the auction may be ended.
    pub end_time: Timestamp,
    /// Minimum bid increment.
    pub min_increment: Amount,
}

/// Bid or withdrawal event data.
#[derive(Debug, Serialize, SchemaType, PartialEq, Eq)]
pub struct BidderEvent {
    /// Bidder account address.
    pub bidder: AccountAddress,
    /// Bid or withdrawn amount.
    pub amount: Amount,
}

/// Auction end event data.
#[derive(Debug, Serialize, SchemaType, PartialEq, Eq)]
pub struct AuctionEndedEvent {
    /// Highest bidder, if anyone bid at all.
    pub winner: Option<AccountAddress>,
    /// Winning bid paid out to the owner.
    pub amount: Amount,
}

/// Tagged Custom event to be serialized for the event log.
#[derive(Debug, PartialEq, Eq)]
pub enum AuctionEvent {
    Created(AuctionCreatedEvent),
    NewHighestBid(BidderEvent),
    Withdrawal(BidderEvent),
    Ended(AuctionEndedEvent),
    Canceled,
}

impl AuctionEvent {
    pub fn new_highest_bid(bidder: AccountAddress, amount: Amount) -> Self {
        Self::NewHighestBid(BidderEvent { bidder, amount })
    }

    pub fn withdrawal(bidder: AccountAddress, amount: Amount) -> Self {
        Self::Withdrawal(BidderEvent { bidder, amount })
    }

    pub fn ended(winner: Option<AccountAddress>, amount: Amount) -> Self {
        Self::Ended(AuctionEndedEvent { winner, amount })
    }
}

impl Serial for AuctionEvent {
    fn serial<W: Write>(&self, out: &mut W) -> Result<(), W::Err> {
        match self {
            AuctionEvent::Created(event) => {
                out.write_u8(AUCTION_CREATED_TAG)?;
                event.serial(out)
            }
            AuctionEvent::NewHighestBid(event) => {
                out.write_u8(NEW_HIGHEST_BID_TAG)?;
                event.serial(out)
            }
            AuctionEvent::Withdrawal(event) => {
                out.write_u8(WITHDRAWAL_TAG)?;
                event.serial(out)
            }
            AuctionEvent::Ended(event) => {
                out.write_u8(AUCTION_ENDED_TAG)?;
                event.serial(out)
            }
            AuctionEvent::Canceled => out.write_u8(AUCTION_CANCELED_TAG),
        }
    }
}

impl Deserial for AuctionEvent {
    fn deserial<R: Read>(source: &mut R) -> ParseResult<Self> {
        let tag = source.read_u8()?;
        match tag {
            AUCTION_CREATED_TAG => AuctionCreatedEvent::deserial(source).map(AuctionEvent::Created),
            NEW_HIGHEST_BID_TAG => BidderEvent::deserial(source).map(AuctionEvent::NewHighestBid),
            WITHDRAWAL_TAG => BidderEvent::deserial(source).map(AuctionEvent::Withdrawal),
            AUCTION_ENDED_TAG => AuctionEndedEvent::deserial(source).map(AuctionEvent::Ended),
            AUCTION_CANCELED_TAG => Ok(AuctionEvent::Canceled),
            _ => Err(ParseError::default()),
        }
    }
}

#[concordium_cfg_test]
mod tests {
    use super::*;

    const ALICE: AccountAddress = AccountAddress([1u8; 32]);

    #[concordium_test]
    fn test_event_tags() {
        let canceled = to_bytes(&AuctionEvent::Canceled);
        claim_eq!(canceled, vec![AUCTION_CANCELED_TAG]);

        let bid = to_bytes(&AuctionEvent::new_highest_bid(
            ALICE,
            Amount::from_micro_ccd(7),
        ));
        claim_eq!(bid[0], NEW_HIGHEST_BID_TAG);
        claim_eq!(&bid[1..33], &ALICE.0[..]);
        claim_eq!(bid.len(), 1 + 32 + 8);
    }

    #[concordium_test]
    fn test_ended_without_winner_decodes() {
        let bytes = to_bytes(&AuctionEvent::ended(None, Amount::zero()));
        let event: AuctionEvent = from_bytes(&bytes).expect_report("Valid event");
        claim_eq!(event, AuctionEvent::ended(None, Amount::zero()));
    }

    #[concordium_test]
    fn test_unknown_tag_rejected() {
        let result: ParseResult<AuctionEvent> = from_bytes(&[0u8]);
        claim!(result.is_err());
    }
}
