// tests/prop_conservation.rs

mod common;

use proptest::prelude::*;

use common::*;
use pos_ledger::chain::Blockchain;
use pos_ledger::state::checker::collect_holdings;
use pos_ledger::tx::convert::{BuyCoinData, SellCoinData};
use pos_ledger::tx::send::SendData;
use pos_ledger::tx::stake::{DelegateData, UnbondData};
use pos_ledger::tx::swap::{AddLiquidityData, CreateSwapPoolData, RemoveLiquidityData, SellSwapPoolData};
use pos_ledger::tx::TxData;
use pos_ledger::types::{coins, Amount, CoinId, PubKey};

#[derive(Clone, Debug)]
enum Op {
    Send { from: usize, to: usize, curve: bool, value: u64 },
    SellBase { from: usize, value: u64 },
    SellCurve { from: usize, value: u64 },
    BuyCurve { from: usize, value: u64 },
    AddLiquidity { from: usize, value: u64 },
    RemoveLiquidity { from: usize, value: u64 },
    SwapPool { from: usize, value: u64, to_base: bool },
    Delegate { from: usize, value: u64 },
    Unbond { from: usize, value: u64 },
}

impl Op {
    fn sender(&self) -> usize {
        match *self {
            Op::Send { from, .. }
            | Op::SellBase { from, .. }
            | Op::SellCurve { from, .. }
            | Op::BuyCurve { from, .. }
            | Op::AddLiquidity { from, .. }
            | Op::RemoveLiquidity { from, .. }
            | Op::SwapPool { from, .. }
            | Op::Delegate { from, .. }
            | Op::Unbond { from, .. } => from,
        }
    }
}

/// What the generated transactions act on.
struct Targets {
    curve: CoinId,
    validator: PubKey,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 0..3usize, any::<bool>(), 1..50_000u64).prop_map(|(from, to, curve, value)| Op::Send {
            from,
            to,
            curve,
            value
        }),
        (0..3usize, 1..50_000u64).prop_map(|(from, value)| Op::SellBase { from, value }),
        (0..3usize, 1..50_000u64).prop_map(|(from, value)| Op::SellCurve { from, value }),
        (0..3usize, 1..50_000u64).prop_map(|(from, value)| Op::BuyCurve { from, value }),
        (0..3usize, 1..50_000u64).prop_map(|(from, value)| Op::AddLiquidity { from, value }),
        (0..3usize, 1..50_000u64).prop_map(|(from, value)| Op::RemoveLiquidity { from, value }),
        (0..3usize, 1..50_000u64, any::<bool>()).prop_map(|(from, value, to_base)| Op::SwapPool { from, value, to_base }),
        (0..3usize, 1..50_000u64).prop_map(|(from, value)| Op::Delegate { from, value }),
        (0..3usize, 1..50_000u64).prop_map(|(from, value)| Op::Unbond { from, value }),
    ]
}

/// Milli-units keep the amounts varied without making every tx fail.
fn milli(v: u64) -> Amount {
    Amount::from(v) * coins(1) / 1_000
}

fn to_tx(op: &Op, users: &[Key], targets: &Targets, nonces: &mut [u64]) -> Vec<u8> {
    let curve = targets.curve;
    let (from, data) = match *op {
        Op::Send { from, to, curve: in_curve, value } => {
            let coin = if in_curve { curve } else { CoinId::BASE };
            (from, TxData::Send(SendData { coin, to: users[to].address, value: milli(value) }))
        }
        Op::SellBase { from, value } => (
            from,
            TxData::SellCoin(SellCoinData {
                coin_to_sell: CoinId::BASE,
                value_to_sell: milli(value),
                coin_to_buy: curve,
                minimum_value_to_buy: 0,
            }),
        ),
        Op::SellCurve { from, value } => (
            from,
            TxData::SellCoin(SellCoinData {
                coin_to_sell: curve,
                value_to_sell: milli(value),
                coin_to_buy: CoinId::BASE,
                minimum_value_to_buy: 0,
            }),
        ),
        Op::BuyCurve { from, value } => (
            from,
            TxData::BuyCoin(BuyCoinData {
                coin_to_buy: curve,
                value_to_buy: milli(value),
                coin_to_sell: CoinId::BASE,
                maximum_value_to_sell: Amount::MAX,
            }),
        ),
        Op::AddLiquidity { from, value } => (
            from,
            TxData::AddLiquidity(AddLiquidityData {
                coin0: CoinId::BASE,
                coin1: curve,
                volume0: milli(value),
                maximum_volume1: Amount::MAX,
            }),
        ),
        Op::RemoveLiquidity { from, value } => (
            from,
            TxData::RemoveLiquidity(RemoveLiquidityData {
                coin0: CoinId::BASE,
                coin1: curve,
                liquidity: milli(value),
                minimum_volume0: 0,
                minimum_volume1: 0,
            }),
        ),
        Op::SwapPool { from, value, to_base } => {
            let route = if to_base { vec![curve, CoinId::BASE] } else { vec![CoinId::BASE, curve] };
            (from, TxData::SellSwapPool(SellSwapPoolData { coins: route, value_to_sell: milli(value), minimum_value_to_buy: 0 }))
        }
        Op::Delegate { from, value } => (
            from,
            TxData::Delegate(DelegateData { pubkey: targets.validator, coin: CoinId::BASE, value: milli(value) }),
        ),
        Op::Unbond { from, value } => (
            from,
            TxData::Unbond(UnbondData { pubkey: targets.validator, coin: CoinId::BASE, value: milli(value) }),
        ),
    };
    // rewound by the caller when the tx is rejected
    nonces[from] += 1;
    signed(&users[from], nonces[from], data)
}

fn assert_conserved(chain: &Blockchain) {
    let st = chain.state();
    let holdings = collect_holdings(st).unwrap();
    for coin in st.coins.all().unwrap().values().filter(|c| !c.deleted) {
        assert_eq!(holdings.of(coin.id), coin.volume, "coin {} volume drifted", coin.id);
    }
    let app = st.app.get().unwrap();
    assert_eq!(holdings.base_total(), app.emission - app.total_slashed);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    // at least twelve blocks, so every run crosses the reward cycle of the test config
    #[test]
    fn supplies_are_conserved_across_blocks(blocks in proptest::collection::vec(proptest::collection::vec(arb_op(), 0..6), 12..16)) {
        let cfg = test_config();
        let users: Vec<Key> = (1..=3).map(Key::from_seed).collect();
        let validator = Key::from_seed(9);
        let mut curve = CoinId::BASE;
        let mut chain = genesis(cfg.clone(), |st| {
            seed_validator(st, &cfg, &validator, coins(1_000));
            for u in &users {
                st.accounts.add_balance(&u.address, CoinId::BASE, coins(1_000)).unwrap();
            }
            curve = seed_coin(st, curve_coin("CURVE", coins(100_000), coins(100_000), 50), &users[0].address);
        });
        assert_conserved(&chain);

        let pool = CreateSwapPoolData { coin0: CoinId::BASE, coin1: curve, volume0: coins(100), volume1: coins(1_000) };
        let (resp, _) = run_block(&mut chain, &[signed(&users[0], 1, TxData::CreateSwapPool(pool))]);
        assert_ok(&resp[0]);
        assert_conserved(&chain);

        let targets = Targets { curve, validator: validator.pubkey };
        let mut nonces = vec![1u64, 0, 0];
        let mut paid = false;
        for ops in &blocks {
            let height = chain.height() + 1;
            let votes = all_signed(&chain);
            chain.begin_block(height, &votes, &[]).unwrap();
            for op in ops {
                let raw = to_tx(op, &users, &targets, &mut nonces);
                if !chain.deliver_tx(&raw).is_ok() {
                    nonces[op.sender()] -= 1;
                }
            }
            let end = chain.end_block().unwrap();
            paid |= height % cfg.reward_cycle == 0 && !end.events.is_empty();
            chain.commit().unwrap();
            assert_conserved(&chain);
        }
        prop_assert!(paid, "no reward cycle was crossed");
    }
}
