use commons::{ContractResult, CustomContractError};
use concordium_std::*;

use crate::external::AuctionView;

/// The state in which an auction can be.
#[derive(Debug, Clone, Copy, Serialize, SchemaType, PartialEq, Eq)]
pub enum AuctionStatus {
    /// The auction is either
    /// - still accepting bids or
    /// - past its end time, but the owner has not ended it yet.
    Active,
    /// The owner ended the auction and collected the highest bid.
    Ended,
    /// The owner canceled the auction.
    Canceled,
}

/// Auction parameters, fixed on initialization.
#[derive(Debug, Clone, Serialize, SchemaType, PartialEq, Eq)]
pub struct AuctionConfig {
    /// Account that created the auction. Only it may end or cancel.
    pub owner: AccountAddress,
    /// Minimum bid increment.
    pub min_increment: Amount,
    /// Slot time of the auction creation.
    pub start: Timestamp,
    /// Slot time from which the auction may be ended.
    pub end: Timestamp,
}

impl AuctionConfig {
    pub fn new(
        owner: AccountAddress,
        bidding_duration: Duration,
        min_increment: Amount,
        start: Timestamp,
    ) -> ContractResult<Self> {
        ensure!(
            bidding_duration.millis() > 0,
            CustomContractError::InvalidDuration
        );
        ensure!(
            min_increment > Amount::zero(),
            CustomContractError::InvalidIncrement
        );

        let end = start
            .checked_add(bidding_duration)
            .ok_or(CustomContractError::InvalidDuration)?;

        Ok(Self {
            owner,
            min_increment,
            start,
            end,
        })
    }
}

/// Result of ending the auction. The amount MUST be paid out to the owner.
#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub struct AuctionOutcome {
    pub winner: Option<AccountAddress>,
    pub amount: Amount,
}

/// The contract state.
#[derive(Serial, DeserialWithState)]
#[concordium(state_parameter = "S")]
pub struct State<S: HasStateApi> {
    config: AuctionConfig,
    status: AuctionStatus,
    /// Amount held by `highest_bidder`. Zero until the first bid.
    highest_bid: Amount,
    highest_bidder: Option<AccountAddress>,
    /// Refundable balances of outbid accounts. Drained entries are removed.
    pending_returns: StateMap<AccountAddress, Amount, S>,
}

impl<S: HasStateApi> State<S> {
    /// Create an active auction with no bids.
    pub fn new(state_builder: &mut StateBuilder<S>, config: AuctionConfig) -> Self {
        State {
            config,
            status: AuctionStatus::Active,
            highest_bid: Amount::zero(),
            highest_bidder: None,
            pending_returns: state_builder.new_map(),
        }
    }

    pub fn owner(&self) -> AccountAddress {
        self.config.owner
    }

    pub fn highest_bid(&self) -> Amount {
        self.highest_bid
    }

    pub fn highest_bidder(&self) -> Option<AccountAddress> {
        self.highest_bidder
    }

    pub fn status(&self) -> AuctionStatus {
        self.status
    }

    pub fn ended(&self) -> bool {
        self.status == AuctionStatus::Ended
    }

    pub fn canceled(&self) -> bool {
        self.status == AuctionStatus::Canceled
    }

    pub fn end_time(&self) -> Timestamp {
        self.config.end
    }

    /// Refundable balance of `account`, zero if it has none.
    pub fn pending_return(&self, account: &AccountAddress) -> Amount {
        self.pending_returns
            .get(account)
            .map(|amount| *amount)
            .unwrap_or_else(Amount::zero)
    }

    pub fn view(&self) -> AuctionView {
        AuctionView {
            owner: self.config.owner,
            highest_bid: self.highest_bid,
            highest_bidder: self.highest_bidder,
            ended: self.ended(),
            canceled: self.canceled(),
            end_time: self.config.end,
            min_increment: self.config.min_increment,
        }
    }

    /// Make `amount` the highest bid, moving the previous highest bid into
    /// the refundable balance of its bidder.
    ///
    /// The slot time is not checked here: bids stay open until the owner
    /// ends or cancels the auction.
    pub fn bid(&mut self, bidder: AccountAddress, amount: Amount) -> ContractResult<()> {
        ensure_eq!(
            self.status,
            AuctionStatus::Active,
            CustomContractError::AuctionClosed
        );

        match self.highest_bidder {
            Some(previous_bidder) => {
                // An unrepresentable threshold can't be exceeded by any bid
                let exceeds_increment = self
                    .highest_bid
                    .micro_ccd
                    .checked_add(self.config.min_increment.micro_ccd)
                    .map_or(false, |threshold| amount.micro_ccd > threshold);
                ensure!(exceeds_increment, CustomContractError::BidTooLow);

                self.credit(previous_bidder, self.highest_bid)?;
            }
            None => ensure!(amount > Amount::zero(), CustomContractError::BidTooLow),
        }

        self.highest_bid = amount;
        self.highest_bidder = Some(bidder);

        Ok(())
    }

    /// Add `amount` to the refundable balance of `account`.
    pub fn credit(&mut self, account: AccountAddress, amount: Amount) -> ContractResult<()> {
        let balance = self
            .pending_return(&account)
            .micro_ccd
            .checked_add(amount.micro_ccd)
            .ok_or(CustomContractError::Overflow)?;
        self.pending_returns
            .insert(account, Amount::from_micro_ccd(balance));

        Ok(())
    }

    /// Remove and return the whole refundable balance of `account`.
    ///
    /// The balance is gone before any payout happens, so a nested call made
    /// while the amount is being transferred finds nothing to withdraw.
    pub fn take_pending_return(&mut self, account: &AccountAddress) -> ContractResult<Amount> {
        match self.pending_returns.remove_and_get(account) {
            Some(amount) if amount > Amount::zero() => Ok(amount),
            _ => Err(CustomContractError::NothingToWithdraw),
        }
    }

    /// Close the auction, returning the amount owed to the owner.
    pub fn end(&mut self, sender: &Address, slot_time: Timestamp) -> ContractResult<AuctionOutcome> {
        ensure!(
            sender.matches_account(&self.config.owner),
            CustomContractError::Unauthorized
        );
        ensure!(slot_time >= self.config.end, CustomContractError::TooEarly);
        ensure_eq!(
            self.status,
            AuctionStatus::Active,
            CustomContractError::AlreadyFinalized
        );

        self.status = AuctionStatus::Ended;

        Ok(AuctionOutcome {
            winner: self.highest_bidder,
            amount: self.highest_bid,
        })
    }

    /// Undo [`State::end`] after the owner payout failed.
    ///
    /// Must only be called right after a successful `end`.
    pub fn reopen(&mut self) {
        self.status = AuctionStatus::Active;
    }

    /// Cancel the auction. The highest bid becomes refundable to its bidder.
    pub fn cancel(&mut self, sender: &Address) -> ContractResult<()> {
        ensure!(
            sender.matches_account(&self.config.owner),
            CustomContractError::Unauthorized
        );
        ensure_eq!(
            self.status,
            AuctionStatus::Active,
            CustomContractError::AlreadyFinalized
        );

        if let Some(bidder) = self.highest_bidder {
            self.credit(bidder, self.highest_bid)?;
        }
        self.status = AuctionStatus::Canceled;

        Ok(())
    }
}

#[concordium_cfg_test]
mod tests {
    use super::*;
    use test_infrastructure::*;

    const OWNER: AccountAddress = AccountAddress([0u8; 32]);
    const ALICE: AccountAddress = AccountAddress([1u8; 32]);
    const BOB: AccountAddress = AccountAddress([2u8; 32]);
    const CAROL: AccountAddress = AccountAddress([3u8; 32]);

    const START: u64 = 1_000;
    const DURATION: u64 = 10;
    const INCREMENT: u64 = 100_000;

    fn ccd(micro_ccd: u64) -> Amount {
        Amount::from_micro_ccd(micro_ccd)
    }

    fn fresh_state() -> State<TestStateApi> {
        let mut state_builder = TestStateBuilder::new();
        let config = AuctionConfig::new(
            OWNER,
            Duration::from_millis(DURATION),
            ccd(INCREMENT),
            Timestamp::from_timestamp_millis(START),
        )
        .expect_report("Valid auction configuration");
        State::new(&mut state_builder, config)
    }

    #[concordium_test]
    fn test_config_rejects_zero_duration() {
        let result = AuctionConfig::new(
            OWNER,
            Duration::from_millis(0),
            ccd(INCREMENT),
            Timestamp::from_timestamp_millis(START),
        );
        claim_eq!(result, Err(CustomContractError::InvalidDuration));
    }

    #[concordium_test]
    fn test_config_rejects_zero_increment() {
        let result = AuctionConfig::new(
            OWNER,
            Duration::from_millis(DURATION),
            Amount::zero(),
            Timestamp::from_timestamp_millis(START),
        );
        claim_eq!(result, Err(CustomContractError::InvalidIncrement));
    }

    #[concordium_test]
    fn test_config_rejects_end_overflow() {
        let result = AuctionConfig::new(
            OWNER,
            Duration::from_millis(DURATION),
            ccd(INCREMENT),
            Timestamp::from_timestamp_millis(u64::MAX),
        );
        claim_eq!(result, Err(CustomContractError::InvalidDuration));
    }

    #[concordium_test]
    fn test_fresh_state() {
        let state = fresh_state();

        claim_eq!(state.owner(), OWNER);
        claim_eq!(state.highest_bid(), Amount::zero());
        claim_eq!(state.highest_bidder(), None);
        claim!(!state.ended());
        claim!(!state.canceled());
        claim_eq!(
            state.end_time(),
            Timestamp::from_timestamp_millis(START + DURATION)
        );
        claim_eq!(state.pending_return(&ALICE), Amount::zero());
    }

    #[concordium_test]
    fn test_first_bid_must_be_positive() {
        let mut state = fresh_state();

        claim_eq!(
            state.bid(ALICE, Amount::zero()),
            Err(CustomContractError::BidTooLow)
        );

        // Anything positive opens the auction, the increment only applies later
        claim_eq!(state.bid(ALICE, ccd(1)), Ok(()));
        claim_eq!(state.highest_bid(), ccd(1));
        claim_eq!(state.highest_bidder(), Some(ALICE));
    }

    #[concordium_test]
    fn test_increment_boundary() {
        let mut state = fresh_state();
        state.bid(ALICE, ccd(1_000_000)).expect_report("First bid");

        claim_eq!(
            state.bid(BOB, ccd(1_000_000 + INCREMENT)),
            Err(CustomContractError::BidTooLow)
        );
        claim_eq!(state.highest_bid(), ccd(1_000_000));
        claim_eq!(state.highest_bidder(), Some(ALICE));
        claim_eq!(state.pending_return(&ALICE), Amount::zero());

        claim_eq!(state.bid(BOB, ccd(1_000_000 + INCREMENT + 1)), Ok(()));
        claim_eq!(state.highest_bid(), ccd(1_000_000 + INCREMENT + 1));
        claim_eq!(state.highest_bidder(), Some(BOB));
    }

    #[concordium_test]
    fn test_refunds_accumulate() {
        let mut state = fresh_state();

        state.bid(ALICE, ccd(1_000_000)).expect_report("Alice bids");
        state.bid(BOB, ccd(1_200_000)).expect_report("Bob outbids Alice");
        state.bid(ALICE, ccd(1_500_000)).expect_report("Alice outbids Bob");
        state.bid(CAROL, ccd(2_000_000)).expect_report("Carol outbids Alice");

        claim_eq!(state.pending_return(&ALICE), ccd(2_500_000));
        claim_eq!(state.pending_return(&BOB), ccd(1_200_000));
        claim_eq!(state.pending_return(&CAROL), Amount::zero());
        claim_eq!(state.highest_bid(), ccd(2_000_000));
    }

    #[concordium_test]
    fn test_raising_own_bid_refunds_previous() {
        let mut state = fresh_state();

        state.bid(ALICE, ccd(1_000_000)).expect_report("Alice bids");
        state.bid(ALICE, ccd(1_200_000)).expect_report("Alice raises");

        claim_eq!(state.highest_bidder(), Some(ALICE));
        claim_eq!(state.pending_return(&ALICE), ccd(1_000_000));
    }

    #[concordium_test]
    fn test_highest_bid_never_decreases() {
        let mut state = fresh_state();
        let bids = [
            (ALICE, 500_000),
            (BOB, 550_000),
            (CAROL, 650_000),
            (ALICE, 600_000),
            (BOB, 750_001),
            (CAROL, 800_000),
        ];

        let mut previous = Amount::zero();
        for (bidder, amount) in bids.iter() {
            let _ = state.bid(*bidder, ccd(*amount));
            claim!(state.highest_bid() >= previous);
            previous = state.highest_bid();
        }
        claim_eq!(state.highest_bid(), ccd(750_001));
        claim_eq!(state.highest_bidder(), Some(BOB));
    }

    #[concordium_test]
    fn test_withdraw_pays_once() {
        let mut state = fresh_state();
        state.bid(ALICE, ccd(1_000_000)).expect_report("Alice bids");
        state.bid(BOB, ccd(1_200_000)).expect_report("Bob bids");

        claim_eq!(state.take_pending_return(&ALICE), Ok(ccd(1_000_000)));
        claim_eq!(state.pending_return(&ALICE), Amount::zero());
        claim_eq!(
            state.take_pending_return(&ALICE),
            Err(CustomContractError::NothingToWithdraw)
        );
        claim_eq!(
            state.take_pending_return(&BOB),
            Err(CustomContractError::NothingToWithdraw)
        );
    }

    #[concordium_test]
    fn test_nested_withdraw_during_payout() {
        let mut state = fresh_state();
        state.bid(ALICE, ccd(1_000_000)).expect_report("Alice bids");
        state.bid(BOB, ccd(1_200_000)).expect_report("Bob bids");

        let payout = state
            .take_pending_return(&ALICE)
            .expect_report("Alice has a refund");

        // Re-entry before the outer payout completes
        claim_eq!(
            state.take_pending_return(&ALICE),
            Err(CustomContractError::NothingToWithdraw)
        );
        claim_eq!(payout, ccd(1_000_000));
    }

    #[concordium_test]
    fn test_end_checks() {
        let mut state = fresh_state();
        state.bid(ALICE, ccd(1_000_000)).expect_report("Alice bids");
        let end = Timestamp::from_timestamp_millis(START + DURATION);
        let before_end = Timestamp::from_timestamp_millis(START + DURATION - 1);

        claim_eq!(
            state.end(&Address::Account(ALICE), end),
            Err(CustomContractError::Unauthorized)
        );
        claim_eq!(
            state.end(&Address::Account(OWNER), before_end),
            Err(CustomContractError::TooEarly)
        );
        claim!(!state.ended());

        claim_eq!(
            state.end(&Address::Account(OWNER), end),
            Ok(AuctionOutcome {
                winner: Some(ALICE),
                amount: ccd(1_000_000),
            })
        );
        claim!(state.ended());
        claim!(!state.canceled());

        claim_eq!(
            state.end(&Address::Account(OWNER), end),
            Err(CustomContractError::AlreadyFinalized)
        );
        claim_eq!(
            state.bid(BOB, ccd(5_000_000)),
            Err(CustomContractError::AuctionClosed)
        );
        claim_eq!(state.highest_bidder(), Some(ALICE));
    }

    #[concordium_test]
    fn test_bid_after_end_time_before_finalization() {
        let mut state = fresh_state();

        // Time alone doesn't close the auction
        claim_eq!(state.bid(ALICE, ccd(1_000_000)), Ok(()));
        let late = Timestamp::from_timestamp_millis(START + DURATION + 100);
        let outcome = state
            .end(&Address::Account(OWNER), late)
            .expect_report("Owner ends the auction");
        claim_eq!(outcome.winner, Some(ALICE));
    }

    #[concordium_test]
    fn test_reopen_after_failed_payout() {
        let mut state = fresh_state();
        state.bid(ALICE, ccd(1_000_000)).expect_report("Alice bids");
        let end = Timestamp::from_timestamp_millis(START + DURATION);

        let _ = state.end(&Address::Account(OWNER), end);
        state.reopen();

        claim_eq!(state.status(), AuctionStatus::Active);
        claim_eq!(state.bid(BOB, ccd(2_000_000)), Ok(()));
    }

    #[concordium_test]
    fn test_cancel_refunds_highest_bidder() {
        let mut state = fresh_state();
        state.bid(ALICE, ccd(1_000_000)).expect_report("Alice bids");
        state.bid(BOB, ccd(1_200_000)).expect_report("Bob bids");

        claim_eq!(
            state.cancel(&Address::Account(BOB)),
            Err(CustomContractError::Unauthorized)
        );
        claim_eq!(state.cancel(&Address::Account(OWNER)), Ok(()));

        claim!(state.canceled());
        claim!(!state.ended());
        claim_eq!(state.pending_return(&ALICE), ccd(1_000_000));
        claim_eq!(state.pending_return(&BOB), ccd(1_200_000));

        claim_eq!(
            state.cancel(&Address::Account(OWNER)),
            Err(CustomContractError::AlreadyFinalized)
        );
        claim_eq!(
            state.end(
                &Address::Account(OWNER),
                Timestamp::from_timestamp_millis(START + DURATION)
            ),
            Err(CustomContractError::AlreadyFinalized)
        );
        claim_eq!(
            state.bid(CAROL, ccd(5_000_000)),
            Err(CustomContractError::AuctionClosed)
        );

        // Refunds stay withdrawable after cancellation
        claim_eq!(state.take_pending_return(&BOB), Ok(ccd(1_200_000)));
    }

    #[concordium_test]
    fn test_cancel_without_bids() {
        let mut state = fresh_state();

        claim_eq!(state.cancel(&Address::Account(OWNER)), Ok(()));
        claim!(state.canceled());
        claim_eq!(
            state.bid(ALICE, ccd(1_000_000)),
            Err(CustomContractError::AuctionClosed)
        );
    }
}
