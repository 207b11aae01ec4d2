use super::*;

/// Result of the ledger operations, before it gets turned into a `Reject`.
pub type ContractResult<A> = Result<A, CustomContractError>;
