use super::*;

/// The custom errors the contract can produce.
#[derive(Serialize, Debug, PartialEq, Eq, Reject, SchemaType)]
pub enum CustomContractError {
    /// Failed parsing the parameter (Error code: -1).
    #[from(ParseError)]
    ParseParams,
    /// Failed logging: Log is full (Error code: -2).
    LogFull,
    /// Failed logging: Log is malformed (Error code: -3).
    LogMalformed,
    /// Only account addresses can bid (Error code: -4).
    OnlyAccountAddress,
    /// Bidding duration is zero or the auction end overflows (Error code: -5).
    InvalidDuration,
    /// Minimum bid increment must be positive (Error code: -6).
    InvalidIncrement,
    /// Bid placed after the auction was ended or canceled (Error code: -7).
    AuctionClosed,
    /// Bid does not exceed the highest bid by more than the minimum
    /// increment, or the first bid is zero (Error code: -8).
    BidTooLow,
    /// Only the auction owner has access (Error code: -9).
    Unauthorized,
    /// Attempt to end the auction before its end time (Error code: -10).
    TooEarly,
    /// Auction was already ended or canceled (Error code: -11).
    AlreadyFinalized,
    /// Sender has no refundable balance (Error code: -12).
    NothingToWithdraw,
    /// Amount arithmetic overflowed (Error code: -13).
    Overflow,
    /// Failed to invoke a transfer (Error code: -14).
    InvokeTransferError,
}

/// Mapping the logging errors to CustomContractError.
impl From<LogError> for CustomContractError {
    fn from(le: LogError) -> Self {
        match le {
            LogError::Full => Self::LogFull,
            LogError::Malformed => Self::LogMalformed,
        }
    }
}

/// Mapping errors related to transfers to CustomContractError.
impl From<TransferError> for CustomContractError {
    fn from(_te: TransferError) -> Self {
        Self::InvokeTransferError
    }
}
