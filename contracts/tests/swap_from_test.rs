//! Integration tests for `swap_from_synth`.

mod common;

use alloy_primitives::Address;
use common::*;
use synthswap_contracts::{ErrorKind, PositionEvent, PositionId, SwapError};
use synthswap_protocol::chain::CallContext;
use synthswap_protocol::Amount;

fn settled_sbtc() -> (World, PositionId) {
    let mut w = World::new();
    let id = w.open_sbtc(ALICE);
    w.wait(SETTLEMENT_DELAY);
    w.swap.take_events();
    (w, id)
}

fn swap_from(
    w: &mut World,
    caller: Address,
    id: PositionId,
    target: Address,
    amount: Amount,
    min_amount: Amount,
) -> Result<Amount, SwapError> {
    w.swap.swap_from_synth(
        &mut w.chain,
        CallContext::new(caller),
        id,
        target,
        amount,
        min_amount,
        None,
    )
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[test]
fn swap_from_pays_quoted_amount() {
    let (mut w, id) = settled_sbtc();
    let amount = w.underlying(id) / 2;
    let quote = w
        .swap
        .get_swap_from_synth_amount(&w.chain, SBTC, WBTC, amount)
        .unwrap();
    assert!(quote > 0);

    let received = swap_from(&mut w, ALICE, id, WBTC, amount, quote).unwrap();

    assert_eq!(received, quote);
    assert_eq!(w.balance(WBTC, ALICE), quote);
    assert_eq!(w.balance(SBTC, ALICE), 0);
    assert_eq!(w.swap.owner_of(id), Ok(ALICE));
    w.assert_no_float();
}

#[test]
fn swap_from_into_native() {
    let mut w = World::new();
    let id = w.open(BOB, USDT, SETH, units(30_000, 6));
    w.wait(SETTLEMENT_DELAY);
    let amount = w.underlying(id);
    let quote = w
        .swap
        .get_swap_from_synth_amount(&w.chain, SETH, ETH, amount)
        .unwrap();

    let received = swap_from(&mut w, BOB, id, ETH, amount, 0).unwrap();

    assert_eq!(received, quote);
    assert_eq!(w.balance(ETH, BOB), quote);
    // Roughly 10 ETH after two small fees.
    assert!(quote > units(9, 18) && quote < units(10, 18));
    assert!(w.swap.owner_of(id).is_err());
    w.assert_no_float();
}

#[test]
fn swap_from_to_other_receiver() {
    let (mut w, id) = settled_sbtc();
    let amount = w.underlying(id);

    let received = w
        .swap
        .swap_from_synth(
            &mut w.chain,
            CallContext::new(ALICE),
            id,
            WBTC,
            amount,
            0,
            Some(CHARLIE),
        )
        .unwrap();

    assert_eq!(w.balance(WBTC, CHARLIE), received);
    assert_eq!(w.balance(WBTC, ALICE), 0);
}

#[test]
fn swap_from_draining_burns_position() {
    let (mut w, id) = settled_sbtc();
    let amount = w.underlying(id);

    swap_from(&mut w, ALICE, id, WBTC, amount, 0).unwrap();

    assert_eq!(w.swap.owner_of(id), Err(SwapError::UnknownTokenId(id)));
    assert_eq!(w.balance(SBTC, id.vault_address()), 0);
    assert_eq!(
        w.swap.take_events(),
        vec![PositionEvent::Transfer {
            from: ALICE,
            to: Address::ZERO,
            token_id: id,
        }]
    );
    assert!(!w.swap.vault_pool().is_assigned(id.vault_address()));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn swap_from_pending_settlement_fails() {
    let mut w = World::new();
    let id = w.open_sbtc(ALICE);
    w.wait(100);

    let err = swap_from(&mut w, ALICE, id, WBTC, 1, 0).unwrap_err();
    assert_eq!(err, SwapError::SettlementPending { seconds_left: 200 });
}

#[test]
fn swap_from_into_held_synth_fails() {
    let (mut w, id) = settled_sbtc();
    let err = swap_from(&mut w, ALICE, id, SBTC, 1, 0).unwrap_err();
    assert_eq!(err, SwapError::SameSynth(SBTC));
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn swap_from_into_other_class_fails() {
    let (mut w, id) = settled_sbtc();
    let err = swap_from(&mut w, ALICE, id, DAI, 1, 0).unwrap_err();
    assert_eq!(
        err,
        SwapError::TargetNotTradable {
            target: DAI,
            synth: SBTC
        }
    );
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn swap_from_checks_caller_before_target() {
    let (mut w, id) = settled_sbtc();
    let err = swap_from(&mut w, BOB, id, DAI, 1, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn swap_from_more_than_balance_fails() {
    let (mut w, id) = settled_sbtc();
    let balance = w.underlying(id);
    let err = swap_from(&mut w, ALICE, id, WBTC, balance + 1, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Bounds);
    assert_eq!(w.underlying(id), balance);
}

#[test]
fn swap_from_slippage_boundary() {
    let (mut w, id) = settled_sbtc();
    let amount = w.underlying(id);
    let quote = w
        .swap
        .get_swap_from_synth_amount(&w.chain, SBTC, WBTC, amount)
        .unwrap();

    let err = swap_from(&mut w, ALICE, id, WBTC, amount, quote + 1).unwrap_err();
    assert_eq!(
        err,
        SwapError::Slippage {
            minimum: quote + 1,
            received: quote
        }
    );
    // The would-be burn was rolled back with everything else.
    assert_eq!(w.swap.owner_of(id), Ok(ALICE));
    assert_eq!(w.underlying(id), amount);
    assert_eq!(w.balance(WBTC, ALICE), 0);
    assert!(w.swap.vault_pool().is_assigned(id.vault_address()));
    assert!(w.swap.take_events().is_empty());

    assert_eq!(swap_from(&mut w, ALICE, id, WBTC, amount, quote), Ok(quote));
}
