//! Candle auction. Accounts raise the highest bid by more than a fixed
//! increment until the owner ends or cancels the auction. Outbid amounts are
//! kept as refundable balances that every bidder withdraws on their own.
#![cfg_attr(not(feature = "std"), no_std)]

pub mod contract;
pub mod events;
pub mod external;
pub mod state;
