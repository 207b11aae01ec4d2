/// Tag for the Auction Created event.
pub const AUCTION_CREATED_TAG: u8 = u8::MAX;

/// Tag for the New Highest Bid event.
pub const NEW_HIGHEST_BID_TAG: u8 = u8::MAX - 1;

/// Tag for the Withdrawal event.
pub const WITHDRAWAL_TAG: u8 = u8::MAX - 2;

/// Tag for the Auction Ended event.
pub const AUCTION_ENDED_TAG: u8 = u8::MAX - 3;

/// Tag for the Auction Canceled event.
pub const AUCTION_CANCELED_TAG: u8 = u8::MAX - 4;
