use commons::CustomContractError;
use concordium_std::*;

use crate::events::*;
use crate::external::*;
use crate::state::{AuctionConfig, State};

/// Init function that creates a new auction owned by the sender.
///
/// It rejects if:
/// - It fails to parse the parameter.
/// - The bidding duration is zero or its end time overflows.
/// - The minimum increment is zero.
#[init(
    contract = "CandleAuction",
    parameter = "InitParameter",
    enable_logger
)]
fn auction_init<S: HasStateApi>(
    ctx: &impl HasInitContext,
    state_builder: &mut StateBuilder<S>,
    logger: &mut impl HasLogger,
) -> InitResult<State<S>> {
    let params: InitParameter = ctx
        .parameter_cursor()
        .get()
        .map_err(CustomContractError::from)?;

    let config = AuctionConfig::new(
        ctx.init_origin(),
        params.bidding_duration,
        params.min_increment,
        ctx.metadata().slot_time(),
    )?;

    logger
        .log(&AuctionEvent::Created(AuctionCreatedEvent {
            owner: config.owner,
            end_time: config.end,
            min_increment: config.min_increment,
        }))
        .map_err(CustomContractError::from)?;

    Ok(State::new(state_builder, config))
}

/// Receive function in which accounts bid until the auction is ended or
/// canceled. An outbid amount becomes withdrawable by its bidder.
///
/// It rejects if:
/// - Sender is not an account.
/// - The auction is ended or canceled.
/// - The amount does not exceed the highest bid by more than the minimum
///   increment, or it is the first bid and zero.
#[receive(
    mutable,
    payable,
    contract = "CandleAuction",
    name = "bid",
    enable_logger
)]
fn auction_bid<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    amount: Amount,
    logger: &mut impl HasLogger,
) -> ReceiveResult<()> {
    let bidder = if let Address::Account(bidder) = ctx.sender() {
        bidder
    } else {
        bail!(CustomContractError::OnlyAccountAddress.into());
    };

    host.state_mut().bid(bidder, amount)?;

    logger
        .log(&AuctionEvent::new_highest_bid(bidder, amount))
        .map_err(CustomContractError::from)?;

    Ok(())
}

/// Pay out the whole refundable balance of the sender.
///
/// It rejects if:
/// - Sender is not an account.
/// - Sender has nothing to withdraw.
/// - The transfer fails. The balance stays withdrawable in that case.
#[receive(
    mutable,
    contract = "CandleAuction",
    name = "withdraw",
    enable_logger
)]
fn auction_withdraw<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
) -> ReceiveResult<()> {
    let bidder = if let Address::Account(bidder) = ctx.sender() {
        bidder
    } else {
        bail!(CustomContractError::OnlyAccountAddress.into());
    };

    // Balance is cleared before the transfer
    let amount = host.state_mut().take_pending_return(&bidder)?;

    if let Err(error) = host.invoke_transfer(&bidder, amount) {
        host.state_mut().credit(bidder, amount)?;
        bail!(CustomContractError::from(error).into());
    }

    logger
        .log(&AuctionEvent::withdrawal(bidder, amount))
        .map_err(CustomContractError::from)?;

    Ok(())
}

/// Receive function used by the owner to end the auction once its end time
/// is reached. The highest bid is transferred to the owner.
///
/// It rejects if:
/// - Sender is not the owner.
/// - The end time is not reached yet.
/// - The auction is already ended or canceled.
/// - The transfer to the owner fails. The auction stays active in that case.
#[receive(
    mutable,
    contract = "CandleAuction",
    name = "endAuction",
    enable_logger
)]
fn auction_end<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
) -> ReceiveResult<()> {
    let outcome = host
        .state_mut()
        .end(&ctx.sender(), ctx.metadata().slot_time())?;

    if outcome.amount > Amount::zero() {
        let owner = host.state().owner();
        if let Err(error) = host.invoke_transfer(&owner, outcome.amount) {
            host.state_mut().reopen();
            bail!(CustomContractError::from(error).into());
        }
    }

    logger
        .log(&AuctionEvent::ended(outcome.winner, outcome.amount))
        .map_err(CustomContractError::from)?;

    Ok(())
}

/// Receive function used by the owner to cancel the auction at any time
/// before it is ended. The highest bid becomes withdrawable by its bidder.
///
/// It rejects if:
/// - Sender is not the owner.
/// - The auction is already ended or canceled.
#[receive(
    mutable,
    contract = "CandleAuction",
    name = "cancelAuction",
    enable_logger
)]
fn auction_cancel<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
) -> ReceiveResult<()> {
    host.state_mut().cancel(&ctx.sender())?;

    logger
        .log(&AuctionEvent::Canceled)
        .map_err(CustomContractError::from)?;

    Ok(())
}

/// View function that returns the auction summary.
#[receive(contract = "CandleAuction", name = "view", return_value = "AuctionView")]
fn auction_view<S: HasStateApi>(
    _ctx: &impl HasReceiveContext,
    host: &impl HasHost<State<S>, StateApiType = S>,
) -> ReceiveResult<AuctionView> {
    Ok(host.state().view())
}

/// View function that returns the refundable balance of an account.
#[receive(
    contract = "CandleAuction",
    name = "pendingReturn",
    parameter = "AccountAddress",
    return_value = "Amount"
)]
fn auction_pending_return<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &impl HasHost<State<S>, StateApiType = S>,
) -> ReceiveResult<Amount> {
    let account: AccountAddress = ctx
        .parameter_cursor()
        .get()
        .map_err(CustomContractError::from)?;

    Ok(host.state().pending_return(&account))
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
    const BIDDING_DURATION: u64 = 10;
    const AUCTION_END: u64 = START + BIDDING_DURATION;

    /// 0.1 CCD
    const MIN_INCREMENT: Amount = Amount { micro_ccd: 100_000 };

    fn ccd(micro_ccd: u64) -> Amount {
        Amount::from_micro_ccd(micro_ccd)
    }

    fn init_parameter() -> InitParameter {
        InitParameter {
            bidding_duration: Duration::from_millis(BIDDING_DURATION),
            min_increment: MIN_INCREMENT,
        }
    }

    fn expect_error<T>(result: Result<T, Reject>, err: CustomContractError, msg: &str) {
        let expected: Reject = err.into();
        match result {
            Ok(_) => panic!("{}", msg),
            Err(actual) => {
                claim_eq!(actual, expected);
            }
        }
    }

    /// Auction created by `OWNER` at `START`.
    fn default_host() -> TestHost<State<TestStateApi>> {
        let parameter_bytes = to_bytes(&init_parameter());
        let mut ctx = TestInitContext::empty();
        ctx.set_init_origin(OWNER)
            .set_parameter(&parameter_bytes)
            .set_metadata_slot_time(Timestamp::from_timestamp_millis(START));
        let mut state_builder = TestStateBuilder::new();
        let mut logger = TestLogger::init();

        let state = auction_init(&ctx, &mut state_builder, &mut logger)
            .expect_report("Failed during init_CandleAuction");

        TestHost::new(state, state_builder)
    }

    fn receive_ctx<'a>(sender: AccountAddress, slot_time: u64) -> TestReceiveContext<'a> {
        let mut ctx = TestReceiveContext::empty();
        ctx.set_sender(Address::Account(sender))
            .set_metadata_slot_time(Timestamp::from_timestamp_millis(slot_time));
        ctx
    }

    /// Bid the way the chain does it: the amount is added to the contract
    /// balance and handed back when the call is rejected.
    fn place_bid(
        host: &mut TestHost<State<TestStateApi>>,
        bidder: AccountAddress,
        amount: Amount,
        logger: &mut TestLogger,
    ) -> ReceiveResult<()> {
        let ctx = receive_ctx(bidder, START + 1);
        let balance = host.self_balance();
        host.set_self_balance(balance + amount);

        let result = auction_bid(&ctx, host, amount, logger);
        if result.is_err() {
            host.set_self_balance(balance);
        }
        result
    }

    fn last_event(logger: &TestLogger) -> AuctionEvent {
        let bytes = logger.logs.last().expect_report("No events logged");
        from_bytes(bytes).expect_report("Malformed event")
    }

    #[concordium_test]
    /// Test that initialization sets the owner, the end time and an empty
    /// ledger, and logs the creation.
    fn test_init() {
        let parameter_bytes = to_bytes(&init_parameter());
        let mut ctx = TestInitContext::empty();
        ctx.set_init_origin(OWNER)
            .set_parameter(&parameter_bytes)
            .set_metadata_slot_time(Timestamp::from_timestamp_millis(START));
        let mut state_builder = TestStateBuilder::new();
        let mut logger = TestLogger::init();

        let state = auction_init(&ctx, &mut state_builder, &mut logger)
            .expect_report("Contract initialization results in error");

        claim_eq!(
            state.view(),
            AuctionView {
                owner: OWNER,
                highest_bid: Amount::zero(),
                highest_bidder: None,
                ended: false,
                canceled: false,
                end_time: Timestamp::from_timestamp_millis(AUCTION_END),
                min_increment: MIN_INCREMENT,
            }
        );
        claim_eq!(
            last_event(&logger),
            AuctionEvent::Created(AuctionCreatedEvent {
                owner: OWNER,
                end_time: Timestamp::from_timestamp_millis(AUCTION_END),
                min_increment: MIN_INCREMENT,
            })
        );
    }

    #[concordium_test]
    fn test_init_rejects_invalid_parameters() {
        let mut state_builder = TestStateBuilder::new();
        let mut logger = TestLogger::init();

        let zero_duration = to_bytes(&InitParameter {
            bidding_duration: Duration::from_millis(0),
            min_increment: MIN_INCREMENT,
        });
        let mut ctx = TestInitContext::empty();
        ctx.set_init_origin(OWNER)
            .set_parameter(&zero_duration)
            .set_metadata_slot_time(Timestamp::from_timestamp_millis(START));
        expect_error(
            auction_init(&ctx, &mut state_builder, &mut logger),
            CustomContractError::InvalidDuration,
            "Zero bidding duration should fail",
        );

        let zero_increment = to_bytes(&InitParameter {
            bidding_duration: Duration::from_millis(BIDDING_DURATION),
            min_increment: Amount::zero(),
        });
        let mut ctx = TestInitContext::empty();
        ctx.set_init_origin(OWNER)
            .set_parameter(&zero_increment)
            .set_metadata_slot_time(Timestamp::from_timestamp_millis(START));
        expect_error(
            auction_init(&ctx, &mut state_builder, &mut logger),
            CustomContractError::InvalidIncrement,
            "Zero minimum increment should fail",
        );

        let mut ctx = TestInitContext::empty();
        ctx.set_init_origin(OWNER).set_parameter(&[1u8, 2]);
        expect_error(
            auction_init(&ctx, &mut state_builder, &mut logger),
            CustomContractError::ParseParams,
            "Malformed parameter should fail",
        );

        claim!(logger.logs.is_empty(), "Rejected init must not log");
    }

    #[concordium_test]
    /// Test the full auction:
    /// 1. Alice bids 1 CCD, Bob outbids her with 1.2 CCD.
    /// 2. Carol bids 1.05 CCD and is rejected, the highest bid stays 1.2 CCD.
    /// 3. Alice withdraws her 1 CCD.
    /// 4. Ending before the end time fails, the owner ends it afterwards and
    ///    receives 1.2 CCD with Bob as the winner.
    /// 5. Any further bid fails.
    fn test_auction_bid_withdraw_and_end() {
        let mut host = default_host();
        let mut logger = TestLogger::init();

        let one = ccd(1_000_000);
        let winning = ccd(1_200_000);

        claim_eq!(place_bid(&mut host, ALICE, one, &mut logger), Ok(()));
        claim_eq!(host.state().highest_bid(), one);
        claim_eq!(last_event(&logger), AuctionEvent::new_highest_bid(ALICE, one));

        claim_eq!(place_bid(&mut host, BOB, winning, &mut logger), Ok(()));
        claim_eq!(host.state().highest_bid(), winning);
        claim_eq!(host.state().highest_bidder(), Some(BOB));

        expect_error(
            place_bid(&mut host, CAROL, ccd(1_050_000), &mut logger),
            CustomContractError::BidTooLow,
            "Bid below the increment should fail",
        );
        claim_eq!(host.state().highest_bid(), winning);
        claim_eq!(host.state().pending_return(&CAROL), Amount::zero());
        claim_eq!(host.self_balance(), one + winning);

        let alice_ctx = receive_ctx(ALICE, START + 2);
        let result = auction_withdraw(&alice_ctx, &mut host, &mut logger);
        claim_eq!(result, Ok(()));
        claim!(host.transfer_occurred(&ALICE, one));
        claim_eq!(last_event(&logger), AuctionEvent::withdrawal(ALICE, one));

        let early_ctx = receive_ctx(OWNER, AUCTION_END - 1);
        expect_error(
            auction_end(&early_ctx, &mut host, &mut logger),
            CustomContractError::TooEarly,
            "Ending before the end time should fail",
        );
        claim!(!host.state().ended());

        let owner_ctx = receive_ctx(OWNER, AUCTION_END);
        let result = auction_end(&owner_ctx, &mut host, &mut logger);
        claim_eq!(result, Ok(()));
        claim!(host.state().ended());
        claim!(host.transfer_occurred(&OWNER, winning));
        claim_eq!(host.self_balance(), Amount::zero());
        claim_eq!(last_event(&logger), AuctionEvent::ended(Some(BOB), winning));

        expect_error(
            place_bid(&mut host, CAROL, ccd(1_300_000), &mut logger),
            CustomContractError::AuctionClosed,
            "Bidding should fail because the auction is ended",
        );
        expect_error(
            auction_end(&owner_ctx, &mut host, &mut logger),
            CustomContractError::AlreadyFinalized,
            "Ending the auction a second time should fail",
        );
    }

    #[concordium_test]
    fn test_increment_boundary() {
        let mut host = default_host();
        let mut logger = TestLogger::init();
        let one = ccd(1_000_000);

        claim_eq!(place_bid(&mut host, ALICE, one, &mut logger), Ok(()));
        expect_error(
            place_bid(&mut host, BOB, one + MIN_INCREMENT, &mut logger),
            CustomContractError::BidTooLow,
            "Bid of exactly the increment should fail",
        );
        claim_eq!(
            place_bid(&mut host, BOB, one + MIN_INCREMENT + ccd(1), &mut logger),
            Ok(())
        );
        claim_eq!(host.state().highest_bidder(), Some(BOB));
    }

    #[concordium_test]
    fn test_bid_zero() {
        let mut host = default_host();
        let mut logger = TestLogger::init();

        expect_error(
            place_bid(&mut host, ALICE, Amount::zero(), &mut logger),
            CustomContractError::BidTooLow,
            "Bidding zero should fail",
        );
        claim!(logger.logs.is_empty());
    }

    #[concordium_test]
    fn test_bid_from_contract() {
        let mut host = default_host();
        let mut logger = TestLogger::init();

        let mut ctx = TestReceiveContext::empty();
        ctx.set_sender(Address::Contract(ContractAddress {
            index: 7,
            subindex: 0,
        }))
        .set_metadata_slot_time(Timestamp::from_timestamp_millis(START));

        expect_error(
            auction_bid(&ctx, &mut host, ccd(1_000_000), &mut logger),
            CustomContractError::OnlyAccountAddress,
            "Contracts can't receive refunds, so they can't bid",
        );
    }

    #[concordium_test]
    fn test_bid_after_end_time_before_end() {
        let mut host = default_host();
        let mut logger = TestLogger::init();

        let late_ctx = receive_ctx(ALICE, AUCTION_END + 5);
        let amount = ccd(1_000_000);
        host.set_self_balance(amount);
        claim_eq!(auction_bid(&late_ctx, &mut host, amount, &mut logger), Ok(()));
        claim_eq!(host.state().highest_bidder(), Some(ALICE));
    }

    #[concordium_test]
    /// Alice is outbid twice, her refunds add up and get paid out once.
    fn test_withdraw_accumulated_refunds() {
        let mut host = default_host();
        let mut logger = TestLogger::init();

        claim_eq!(place_bid(&mut host, ALICE, ccd(1_000_000), &mut logger), Ok(()));
        claim_eq!(place_bid(&mut host, BOB, ccd(1_200_000), &mut logger), Ok(()));
        claim_eq!(place_bid(&mut host, ALICE, ccd(1_500_000), &mut logger), Ok(()));
        claim_eq!(place_bid(&mut host, BOB, ccd(1_700_000), &mut logger), Ok(()));

        let parameter_bytes = to_bytes(&ALICE);
        let mut query_ctx = receive_ctx(CAROL, START + 2);
        query_ctx.set_parameter(&parameter_bytes);
        let result = auction_pending_return(&query_ctx, &host);
        claim_eq!(result, Ok(ccd(2_500_000)));

        let alice_ctx = receive_ctx(ALICE, START + 2);

        claim_eq!(auction_withdraw(&alice_ctx, &mut host, &mut logger), Ok(()));
        claim!(host.transfer_occurred(&ALICE, ccd(2_500_000)));
        claim_eq!(host.state().pending_return(&ALICE), Amount::zero());

        expect_error(
            auction_withdraw(&alice_ctx, &mut host, &mut logger),
            CustomContractError::NothingToWithdraw,
            "Second withdrawal should fail",
        );
        claim_eq!(host.self_balance(), ccd(1_200_000 + 1_700_000));
    }

    #[concordium_test]
    fn test_withdraw_without_balance() {
        let mut host = default_host();
        let mut logger = TestLogger::init();

        claim_eq!(place_bid(&mut host, ALICE, ccd(1_000_000), &mut logger), Ok(()));

        // The highest bidder has nothing refundable
        let alice_ctx = receive_ctx(ALICE, START + 2);
        expect_error(
            auction_withdraw(&alice_ctx, &mut host, &mut logger),
            CustomContractError::NothingToWithdraw,
            "Highest bidder can't withdraw",
        );
        let carol_ctx = receive_ctx(CAROL, START + 2);
        expect_error(
            auction_withdraw(&carol_ctx, &mut host, &mut logger),
            CustomContractError::NothingToWithdraw,
            "Non-bidder can't withdraw",
        );
    }

    #[concordium_test]
    fn test_failed_withdraw_transfer_keeps_balance() {
        let mut host = default_host();
        let mut logger = TestLogger::init();

        claim_eq!(place_bid(&mut host, ALICE, ccd(1_000_000), &mut logger), Ok(()));
        claim_eq!(place_bid(&mut host, BOB, ccd(1_200_000), &mut logger), Ok(()));

        // Contract can't cover the refund, so the transfer fails
        host.set_self_balance(Amount::zero());
        let logged = logger.logs.len();
        let alice_ctx = receive_ctx(ALICE, START + 2);
        expect_error(
            auction_withdraw(&alice_ctx, &mut host, &mut logger),
            CustomContractError::InvokeTransferError,
            "Withdraw should fail when the transfer fails",
        );
        claim_eq!(host.state().pending_return(&ALICE), ccd(1_000_000));
        claim_eq!(logger.logs.len(), logged, "Failed withdraw must not log");

        host.set_self_balance(ccd(2_200_000));
        claim_eq!(auction_withdraw(&alice_ctx, &mut host, &mut logger), Ok(()));
        claim!(host.transfer_occurred(&ALICE, ccd(1_000_000)));
    }

    #[concordium_test]
    fn test_end_unauthorized() {
        let mut host = default_host();
        let mut logger = TestLogger::init();

        let bob_ctx = receive_ctx(BOB, AUCTION_END);
        expect_error(
            auction_end(&bob_ctx, &mut host, &mut logger),
            CustomContractError::Unauthorized,
            "Only the owner can end the auction",
        );
        claim!(!host.state().ended());
    }

    #[concordium_test]
    fn test_end_without_bids() {
        let mut host = default_host();
        let mut logger = TestLogger::init();

        let owner_ctx = receive_ctx(OWNER, AUCTION_END);
        claim_eq!(auction_end(&owner_ctx, &mut host, &mut logger), Ok(()));
        claim!(host.state().ended());
        claim!(!host.transfer_occurred(&OWNER, Amount::zero()));
        claim_eq!(last_event(&logger), AuctionEvent::ended(None, Amount::zero()));
    }

    #[concordium_test]
    fn test_failed_owner_payout_keeps_auction_active() {
        let mut host = default_host();
        let mut logger = TestLogger::init();

        claim_eq!(place_bid(&mut host, ALICE, ccd(1_000_000), &mut logger), Ok(()));
        host.set_self_balance(Amount::zero());

        let owner_ctx = receive_ctx(OWNER, AUCTION_END);
        expect_error(
            auction_end(&owner_ctx, &mut host, &mut logger),
            CustomContractError::InvokeTransferError,
            "Ending should fail when the payout fails",
        );
        claim!(!host.state().ended());

        host.set_self_balance(ccd(1_000_000));
        claim_eq!(auction_end(&owner_ctx, &mut host, &mut logger), Ok(()));
        claim!(host.transfer_occurred(&OWNER, ccd(1_000_000)));
    }

    #[concordium_test]
    fn test_cancel_without_bids() {
        let mut host = default_host();
        let mut logger = TestLogger::init();

        let owner_ctx = receive_ctx(OWNER, START);
        claim_eq!(auction_cancel(&owner_ctx, &mut host, &mut logger), Ok(()));
        claim!(host.state().canceled());
        claim_eq!(last_event(&logger), AuctionEvent::Canceled);

        expect_error(
            place_bid(&mut host, ALICE, ccd(1_000_000), &mut logger),
            CustomContractError::AuctionClosed,
            "Bidding should fail because the auction is canceled",
        );
        expect_error(
            auction_cancel(&owner_ctx, &mut host, &mut logger),
            CustomContractError::AlreadyFinalized,
            "Canceling twice should fail",
        );
    }

    #[concordium_test]
    fn test_cancel_refunds_highest_bidder() {
        let mut host = default_host();
        let mut logger = TestLogger::init();

        claim_eq!(place_bid(&mut host, ALICE, ccd(1_000_000), &mut logger), Ok(()));
        claim_eq!(place_bid(&mut host, BOB, ccd(1_200_000), &mut logger), Ok(()));

        let alice_ctx = receive_ctx(ALICE, START + 2);
        expect_error(
            auction_cancel(&alice_ctx, &mut host, &mut logger),
            CustomContractError::Unauthorized,
            "Only the owner can cancel",
        );

        let owner_ctx = receive_ctx(OWNER, START + 2);
        claim_eq!(auction_cancel(&owner_ctx, &mut host, &mut logger), Ok(()));

        let bob_ctx = receive_ctx(BOB, START + 3);
        claim_eq!(auction_withdraw(&bob_ctx, &mut host, &mut logger), Ok(()));
        claim!(host.transfer_occurred(&BOB, ccd(1_200_000)));
        claim_eq!(auction_withdraw(&alice_ctx, &mut host, &mut logger), Ok(()));
        claim!(host.transfer_occurred(&ALICE, ccd(1_000_000)));
        claim_eq!(host.self_balance(), Amount::zero());

        let owner_ctx = receive_ctx(OWNER, AUCTION_END);
        expect_error(
            auction_end(&owner_ctx, &mut host, &mut logger),
            CustomContractError::AlreadyFinalized,
            "Canceled auction can't be ended",
        );
    }

    #[concordium_test]
    fn test_view() {
        let mut host = default_host();
        let mut logger = TestLogger::init();
        claim_eq!(place_bid(&mut host, ALICE, ccd(1_000_000), &mut logger), Ok(()));

        let ctx = receive_ctx(CAROL, START + 2);
        let view = auction_view(&ctx, &host).expect_report("View should not fail");
        claim_eq!(view.highest_bid, ccd(1_000_000));
        claim_eq!(view.highest_bidder, Some(ALICE));
        claim_eq!(view.owner, OWNER);
        claim!(!view.ended && !view.canceled);
    }
}
