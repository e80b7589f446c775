// tests/transactions.rs

mod common;

use common::*;
use pos_ledger::codec;
use pos_ledger::crypto::multisig_address;
use pos_ledger::state::commission::PriceTable;
use pos_ledger::state::formula;
use pos_ledger::stf::Response;
use pos_ledger::tx::check::{Check, RedeemCheckData};
use pos_ledger::events::Event;
use pos_ledger::tx::coin::{
    BurnTokenData, CreateTokenData, EditCoinOwnerData, MintTokenData, RecreateCoinData, RecreateTokenData,
};
use pos_ledger::tx::multisig::{CreateMultisigData, EditMultisigData};
use pos_ledger::tx::send::SendData;
use pos_ledger::tx::TxData;
use pos_ledger::types::{coins, Amount, CoinId};

fn tag_value<'a>(resp: &'a Response, key: &str) -> Option<&'a str> {
    resp.tags.iter().find(|t| t.key == key).map(|t| t.value.as_str())
}

fn send(coin: CoinId, to: pos_ledger::types::Address, value: Amount) -> TxData {
    TxData::Send(SendData { coin, to, value })
}

#[test]
fn failed_transaction_leaves_no_trace() {
    let (alice, bob) = (Key::from_seed(1), Key::from_seed(2));
    let mut chain = genesis(test_config(), |st| {
        st.accounts.add_balance(&alice.address, CoinId::BASE, coins(5)).unwrap();
    });

    let (resp, _) = run_block(
        &mut chain,
        &[
            signed(&alice, 1, send(CoinId::BASE, bob.address, coins(50))),
            signed(&alice, 2, send(CoinId::BASE, bob.address, coins(1))),
        ],
    );
    assert_eq!(resp[0].code, 107);
    assert!(resp[0].tags.is_empty());
    // the nonce did not advance, so 2 is out of order
    assert_eq!(resp[1].code, 101);

    let st = chain.state();
    assert_eq!(st.accounts.nonce(&alice.address).unwrap(), 0);
    assert_eq!(st.accounts.balance(&alice.address, CoinId::BASE).unwrap(), coins(5));
    assert_eq!(st.accounts.balance(&bob.address, CoinId::BASE).unwrap(), 0);
}

#[test]
fn successful_send_charges_commission_and_tags() {
    let (alice, bob) = (Key::from_seed(1), Key::from_seed(2));
    let mut chain = genesis(test_config(), |st| {
        st.accounts.add_balance(&alice.address, CoinId::BASE, coins(5)).unwrap();
    });
    let fee = PriceTable::default().send;

    let (resp, _) = run_block(&mut chain, &[signed(&alice, 1, send(CoinId::BASE, bob.address, coins(1)))]);
    assert_ok(&resp[0]);
    assert_eq!(tag_value(&resp[0], "tx.from"), Some(alice.address.to_string().as_str()));
    assert_eq!(tag_value(&resp[0], "tx.commission_conversion"), Some("base"));
    assert_eq!(tag_value(&resp[0], "tx.commission_amount"), Some(fee.to_string().as_str()));

    let st = chain.state();
    assert_eq!(st.accounts.nonce(&alice.address).unwrap(), 1);
    assert_eq!(st.accounts.balance(&alice.address, CoinId::BASE).unwrap(), coins(4) - fee);
    assert_eq!(st.accounts.balance(&bob.address, CoinId::BASE).unwrap(), coins(1));
}

#[test]
fn check_tx_runs_against_its_own_copy() {
    let (alice, bob) = (Key::from_seed(1), Key::from_seed(2));
    let chain = genesis(test_config(), |st| {
        st.accounts.add_balance(&alice.address, CoinId::BASE, coins(5)).unwrap();
    });
    let raw = signed(&alice, 1, send(CoinId::BASE, bob.address, coins(1)));

    assert_ok(&chain.check_tx(&raw));
    // same nonce again: the check pipeline remembers the first one
    assert_eq!(chain.check_tx(&raw).code, 101);
    assert_eq!(chain.state().accounts.nonce(&alice.address).unwrap(), 0);
    assert_eq!(chain.state().accounts.balance(&bob.address, CoinId::BASE).unwrap(), 0);
}

#[test]
fn envelope_errors_are_reported_with_their_codes() {
    let alice = Key::from_seed(1);
    let mut chain = genesis(test_config(), |st| {
        st.accounts.add_balance(&alice.address, CoinId::BASE, coins(5)).unwrap();
    });
    let data = send(CoinId::BASE, alice.address, 1);

    let mut wrong_chain = unsigned(1, CoinId::BASE, &data);
    wrong_chain.chain_id = wrong_chain.chain_id.wrapping_add(1);
    let mut free = unsigned(1, CoinId::BASE, &data);
    free.gas_price = 0;
    let mut chatty = unsigned(1, CoinId::BASE, &data);
    chatty.payload = vec![0; 200];

    let (resp, _) = run_block(
        &mut chain,
        &[
            sign_tx(&alice, wrong_chain),
            sign_tx(&alice, free),
            sign_tx(&alice, chatty),
            vec![0xff; 3],
            vec![0; 2_000],
        ],
    );
    let codes: Vec<u32> = resp.iter().map(|r| r.code).collect();
    assert_eq!(codes, vec![114, 113, 109, 106, 105]);
}

#[test]
fn check_is_redeemed_once_and_issuer_pays() {
    let cfg = test_config();
    let (alice, bob, lock) = (Key::from_seed(1), Key::from_seed(2), Key::from_seed(9));
    let mut chain = genesis(cfg.clone(), |st| {
        st.accounts.add_balance(&alice.address, CoinId::BASE, coins(100)).unwrap();
    });

    let mut check = Check {
        nonce: vec![1, 2, 3],
        chain_id: cfg.chain_id,
        due_block: 50,
        coin: CoinId::BASE,
        value: coins(7),
        gas_coin: CoinId::BASE,
        lock: lock.pubkey,
        signature: alice.sign(&[0; 32]),
    };
    check.signature = alice.sign(&check.signing_hash());
    let raw_check = codec::encode(&check).unwrap();
    let redeem = |nonce| {
        let data = RedeemCheckData { raw_check: raw_check.clone(), proof: lock.lock_proof(&bob.address) };
        signed(&bob, nonce, TxData::RedeemCheck(data))
    };

    let (resp, _) = run_block(&mut chain, &[redeem(1)]);
    assert_ok(&resp[0]);
    let fee = PriceTable::default().redeem_check;
    let st = chain.state();
    assert_eq!(st.accounts.balance(&bob.address, CoinId::BASE).unwrap(), coins(7));
    assert_eq!(st.accounts.balance(&alice.address, CoinId::BASE).unwrap(), coins(93) - fee);
    assert!(st.checks.is_used(&check.hash()).unwrap());

    let (resp, _) = run_block(&mut chain, &[redeem(2)]);
    assert_eq!(resp[0].code, 503);
}

#[test]
fn check_with_wrong_proof_or_past_due_is_refused() {
    let cfg = test_config();
    let (alice, bob, lock) = (Key::from_seed(1), Key::from_seed(2), Key::from_seed(9));
    let mut chain = genesis(cfg.clone(), |st| {
        st.accounts.add_balance(&alice.address, CoinId::BASE, coins(100)).unwrap();
    });

    let issue = |due_block| {
        let mut check = Check {
            nonce: vec![due_block as u8],
            chain_id: cfg.chain_id,
            due_block,
            coin: CoinId::BASE,
            value: coins(1),
            gas_coin: CoinId::BASE,
            lock: lock.pubkey,
            signature: alice.sign(&[0; 32]),
        };
        check.signature = alice.sign(&check.signing_hash());
        codec::encode(&check).unwrap()
    };

    // proof made out to another redeemer
    let stolen = RedeemCheckData { raw_check: issue(50), proof: lock.lock_proof(&alice.address) };
    run_block(&mut chain, &[]);
    let expired = RedeemCheckData { raw_check: issue(1), proof: lock.lock_proof(&bob.address) };
    let (resp, _) = run_block(
        &mut chain,
        &[signed(&bob, 1, TxData::RedeemCheck(stolen)), signed(&bob, 1, TxData::RedeemCheck(expired))],
    );
    assert_eq!(resp[0].code, 501);
    assert_eq!(resp[1].code, 502);
    assert_eq!(chain.state().accounts.balance(&alice.address, CoinId::BASE).unwrap(), coins(100));
}

#[test]
fn multisig_needs_threshold_weight() {
    let (alice, bob, carol) = (Key::from_seed(1), Key::from_seed(2), Key::from_seed(3));
    let mut chain = genesis(test_config(), |st| {
        st.accounts.add_balance(&alice.address, CoinId::BASE, coins(100)).unwrap();
    });

    let (threshold, weights, addresses) = (2, vec![1, 1], vec![alice.address, bob.address]);
    let ms = multisig_address(threshold, &weights, &addresses);
    let create = CreateMultisigData { threshold, weights, addresses };
    let (resp, _) = run_block(
        &mut chain,
        &[signed(&alice, 1, TxData::CreateMultisig(create.clone())), signed(&alice, 2, send(CoinId::BASE, ms, coins(10)))],
    );
    assert_ok(&resp[0]);
    assert_ok(&resp[1]);
    assert_eq!(tag_value(&resp[0], "tx.created_multisig"), Some(ms.to_string().as_str()));

    let (resp, _) = run_block(
        &mut chain,
        &[
            signed_multi(ms, &[&alice, &bob], 1, send(CoinId::BASE, carol.address, coins(3))),
            signed_multi(ms, &[&alice], 2, send(CoinId::BASE, carol.address, coins(3))),
            signed_multi(ms, &[&alice, &alice], 2, send(CoinId::BASE, carol.address, coins(3))),
            signed(&alice, 3, TxData::CreateMultisig(create)),
        ],
    );
    assert_ok(&resp[0]);
    assert_eq!(resp[1].code, 608);
    assert_eq!(resp[2].code, 604);
    assert_eq!(resp[3].code, 602);

    let st = chain.state();
    assert_eq!(st.accounts.balance(&carol.address, CoinId::BASE).unwrap(), coins(3));
    assert_eq!(st.accounts.nonce(&ms).unwrap(), 1);
}

#[test]
fn commission_in_a_reserve_coin_is_sold_through_the_curve() {
    let alice = Key::from_seed(1);
    let bob = Key::from_seed(2);
    let mut gas = CoinId::BASE;
    let mut chain = genesis(test_config(), |st| {
        st.accounts.add_balance(&alice.address, CoinId::BASE, coins(5)).unwrap();
        gas = seed_coin(st, curve_coin("GASCOIN", coins(10_000), coins(100_000), 50), &alice.address);
    });
    let fee = PriceTable::default().send;
    let expected = formula::sale_amount(coins(10_000), coins(100_000), 50, fee).unwrap();

    let tx = unsigned(1, gas, &send(CoinId::BASE, bob.address, coins(1)));
    let (resp, _) = run_block(&mut chain, &[sign_tx(&alice, tx)]);
    assert_ok(&resp[0]);
    assert_eq!(tag_value(&resp[0], "tx.commission_conversion"), Some("bancor"));
    assert_eq!(tag_value(&resp[0], "tx.commission_coin"), Some(gas.to_string().as_str()));
    assert_eq!(tag_value(&resp[0], "tx.commission_in_base_coin"), Some(fee.to_string().as_str()));

    let st = chain.state();
    assert_eq!(st.accounts.balance(&alice.address, gas).unwrap(), coins(10_000) - expected);
    assert_eq!(st.accounts.balance(&alice.address, CoinId::BASE).unwrap(), coins(4));
    let coin = st.coins.get_live(gas).unwrap();
    assert_eq!(coin.volume, coins(10_000) - expected);
    assert_eq!(coin.reserve, coins(100_000) - fee);
}

#[test]
fn token_owner_mints_and_holders_burn() {
    let (alice, bob) = (Key::from_seed(1), Key::from_seed(2));
    let mut chain = genesis(test_config(), |st| {
        st.accounts.add_balance(&alice.address, CoinId::BASE, coins(1_000)).unwrap();
        st.accounts.add_balance(&bob.address, CoinId::BASE, coins(10)).unwrap();
    });

    let create = CreateTokenData {
        name: "My token".into(),
        symbol: "MYTOKEN".into(),
        initial_amount: coins(100),
        max_supply: coins(200),
        mintable: true,
        burnable: true,
    };
    let (resp, _) = run_block(&mut chain, &[signed(&alice, 1, TxData::CreateToken(create))]);
    assert_ok(&resp[0]);
    let id = chain.state().coins.id_by_symbol("MYTOKEN").unwrap().expect("token registered");

    let (resp, _) = run_block(
        &mut chain,
        &[
            signed(&alice, 2, TxData::MintToken(MintTokenData { coin: id, value: coins(50) })),
            signed(&bob, 1, TxData::MintToken(MintTokenData { coin: id, value: coins(1) })),
            signed(&alice, 3, TxData::MintToken(MintTokenData { coin: id, value: coins(51) })),
            signed(&alice, 3, send(id, bob.address, coins(20))),
            signed(&bob, 1, TxData::BurnToken(BurnTokenData { coin: id, value: coins(5) })),
            signed(&alice, 4, TxData::BurnToken(BurnTokenData { coin: CoinId::BASE, value: 1 })),
        ],
    );
    assert_ok(&resp[0]);
    assert_eq!(resp[1].code, 206);
    assert_eq!(resp[2].code, 112);
    assert_ok(&resp[3]);
    assert_ok(&resp[4]);
    assert_eq!(resp[5].code, 209);

    let st = chain.state();
    let coin = st.coins.get_live(id).unwrap();
    assert_eq!(coin.volume, coins(145));
    assert_eq!(st.accounts.balance(&alice.address, id).unwrap(), coins(130));
    assert_eq!(st.accounts.balance(&bob.address, id).unwrap(), coins(15));
}

#[test]
fn recreating_archives_the_old_coin_and_ownership_moves() {
    let (alice, bob) = (Key::from_seed(1), Key::from_seed(2));
    let mut old = CoinId::BASE;
    let mut chain = genesis(test_config(), |st| {
        st.accounts.add_balance(&alice.address, CoinId::BASE, coins(100_000)).unwrap();
        st.accounts.add_balance(&bob.address, CoinId::BASE, coins(50_000)).unwrap();
        let mut alpha = curve_coin("ALPHA", coins(1_000), coins(10_000), 50);
        alpha.owner = Some(alice.address);
        old = seed_coin(st, alpha, &alice.address);
    });
    let prices = PriceTable::default();

    let recreate = RecreateCoinData {
        name: "Alpha two".into(),
        symbol: "ALPHA".into(),
        initial_amount: coins(500),
        initial_reserve: coins(20_000),
        crr: 80,
        max_supply: coins(1_000_000),
    };
    let as_token = |symbol: &str| RecreateTokenData {
        name: "Alpha token".into(),
        symbol: symbol.into(),
        initial_amount: coins(10),
        max_supply: coins(100),
        mintable: true,
        burnable: false,
    };
    let (resp, _) = run_block(
        &mut chain,
        &[
            signed(&alice, 1, TxData::RecreateCoin(recreate)),
            signed(&bob, 1, TxData::RecreateToken(as_token("ALPHA"))),
        ],
    );
    assert_ok(&resp[0]);
    assert_eq!(resp[1].code, 206);

    let st = chain.state();
    let second = st.coins.id_by_symbol("ALPHA").unwrap().expect("live coin");
    assert_ne!(second, old);
    assert_eq!(st.coins.id_by_symbol("ALPHA-1").unwrap(), Some(old));
    let archived = st.coins.get_live(old).unwrap();
    assert_eq!(archived.owner, None);
    assert_eq!(archived.volume, coins(1_000));
    let fresh = st.coins.get_live(second).unwrap();
    assert_eq!((fresh.volume, fresh.reserve, fresh.crr), (coins(500), coins(20_000), 80));
    assert_eq!(st.accounts.balance(&alice.address, second).unwrap(), coins(500));
    assert_eq!(st.accounts.balance(&alice.address, old).unwrap(), coins(1_000));
    assert_eq!(
        st.accounts.balance(&alice.address, CoinId::BASE).unwrap(),
        coins(100_000) - coins(20_000) - prices.recreate_coin
    );

    let (resp, _) = run_block(
        &mut chain,
        &[
            signed(&alice, 2, TxData::RecreateToken(as_token("ALPHA"))),
            signed(&alice, 3, TxData::RecreateToken(as_token("ALPHA-1"))),
        ],
    );
    assert_ok(&resp[0]);
    assert_eq!(resp[1].code, 203);
    let third = chain.state().coins.id_by_symbol("ALPHA").unwrap().expect("live token");
    assert!(chain.state().coins.get_live(third).unwrap().is_token());
    assert_eq!(chain.state().coins.id_by_symbol("ALPHA-2").unwrap(), Some(second));

    let hand_over = |symbol: &str| TxData::EditCoinOwner(EditCoinOwnerData { symbol: symbol.into(), new_owner: bob.address });
    let (resp, _) = run_block(
        &mut chain,
        &[
            signed(&alice, 3, hand_over("ALPHA")),
            signed(&alice, 4, hand_over("ALPHA")),
            signed(&bob, 1, TxData::MintToken(MintTokenData { coin: third, value: coins(5) })),
        ],
    );
    assert_ok(&resp[0]);
    assert_eq!(resp[1].code, 206);
    assert_ok(&resp[2]);
    let st = chain.state();
    assert_eq!(st.coins.get_live(third).unwrap().owner, Some(bob.address));
    assert_eq!(st.accounts.balance(&bob.address, third).unwrap(), coins(5));
}

#[test]
fn edited_multisig_keeps_its_address_and_new_owners_sign() {
    let (alice, bob, carol) = (Key::from_seed(1), Key::from_seed(2), Key::from_seed(3));
    let mut chain = genesis(test_config(), |st| {
        st.accounts.add_balance(&alice.address, CoinId::BASE, coins(100)).unwrap();
    });

    let (threshold, weights, addresses) = (2, vec![1, 1], vec![alice.address, bob.address]);
    let ms = multisig_address(threshold, &weights, &addresses);
    let create = CreateMultisigData { threshold, weights, addresses };
    let (resp, _) = run_block(
        &mut chain,
        &[signed(&alice, 1, TxData::CreateMultisig(create)), signed(&alice, 2, send(CoinId::BASE, ms, coins(10)))],
    );
    assert_ok(&resp[0]);
    assert_ok(&resp[1]);

    let edit = EditMultisigData { threshold: 1, weights: vec![1, 1, 1], addresses: vec![alice.address, bob.address, carol.address] };
    let (resp, _) = run_block(
        &mut chain,
        &[
            signed(&alice, 3, TxData::EditMultisig(edit.clone())),
            signed_multi(ms, &[&carol], 1, TxData::EditMultisig(edit.clone())),
            signed_multi(ms, &[&alice, &bob], 1, TxData::EditMultisig(edit)),
            signed_multi(ms, &[&carol], 2, send(CoinId::BASE, carol.address, coins(2))),
        ],
    );
    assert_eq!(resp[0].code, 603);
    assert_eq!(resp[1].code, 604);
    assert_ok(&resp[2]);
    assert_eq!(tag_value(&resp[2], "tx.multisig"), Some(ms.to_string().as_str()));
    assert_ok(&resp[3]);

    let st = chain.state();
    assert_eq!(st.accounts.get(&ms).unwrap().multisig.unwrap().threshold, 1);
    assert_eq!(st.accounts.balance(&carol.address, CoinId::BASE).unwrap(), coins(2));
    assert_eq!(st.accounts.nonce(&ms).unwrap(), 2);
}

#[test]
fn burning_the_whole_supply_deletes_the_token_at_commit() {
    let alice = Key::from_seed(1);
    let mut id = CoinId::BASE;
    let mut chain = genesis(test_config(), |st| {
        st.accounts.add_balance(&alice.address, CoinId::BASE, coins(10)).unwrap();
        id = seed_coin(st, token("DRAIN", coins(100)), &alice.address);
    });

    let votes = all_signed(&chain);
    chain.begin_block(1, &votes, &[]).unwrap();
    assert_ok(&chain.deliver_tx(&signed(&alice, 1, TxData::BurnToken(BurnTokenData { coin: id, value: coins(100) }))));
    // still registered until the block is committed
    assert!(chain.state().coin_exists(id).unwrap());
    chain.end_block().unwrap();
    let committed = chain.commit().unwrap();

    assert_eq!(committed.events, vec![Event::CoinDeleted { coin: id, symbol: "DRAIN".into() }]);
    let st = chain.state();
    assert!(!st.coin_exists(id).unwrap());
    assert_eq!(st.coins.id_by_symbol("DRAIN").unwrap(), None);
    assert_eq!(st.accounts.balance(&alice.address, id).unwrap(), 0);

    let (resp, _) = run_block(&mut chain, &[signed(&alice, 2, send(id, alice.address, 1))]);
    assert_eq!(resp[0].code, 102);
}
