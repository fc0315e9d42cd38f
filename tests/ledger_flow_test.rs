use chrono::NaiveDate;
use lotbook::{
    init_db, Decimal, Direction, EventKind, NewInstrument, ProductType, Repository, TaxState,
    TradeLedger, UserId,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn setup() -> (TradeLedger, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("ledger.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let ledger = TradeLedger::new(repo, UserId::new("default".to_string()));
    (ledger, temp_dir)
}

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 11, n).unwrap()
}

fn knock_out_cert(strike: &str) -> NewInstrument {
    NewInstrument {
        underlying: "DAX".to_string(),
        product_type: ProductType::KnockOutCertificate,
        direction: Direction::Long,
        strike: d(strike),
        strike_currency: "EUR".to_string(),
        wkn: None,
        name: None,
        expiry_date: None,
    }
}

#[tokio::test]
async fn test_full_cycle_from_buy_to_empty_portfolio() {
    let (ledger, _temp) = setup().await;
    ledger
        .set_tax_state(&TaxState::new(d("0"), d("500"), d("0.25")))
        .await
        .unwrap();

    let first = ledger
        .record_buy(&knock_out_cert("18000"), day(1), d("99.9"), 10, d("1"))
        .await
        .unwrap();
    assert_eq!(first.kind, EventKind::Buy);
    assert_eq!(first.total_price, d("1000"));

    let second = ledger
        .record_buy(&knock_out_cert("18000"), day(3), d("119.8"), 5, d("1"))
        .await
        .unwrap();
    assert_eq!(second.kind, EventKind::Rebuy);
    assert_eq!(second.trade_id, first.trade_id);

    // 12 of 15: all of lot 1 plus 2/5 of lot 2 -> basis 1240.
    let partial = ledger
        .partial_sell(first.trade_id, 12, d("150"), d("1"), day(5))
        .await
        .unwrap();
    assert_eq!(partial.gain, d("559"));
    assert_eq!(partial.tax, d("14.75"));
    assert_eq!(partial.total_price, d("1784.25"));

    // The position still shows its full cumulative cost.
    let positions = ledger.open_positions().await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].trade_id, first.trade_id);
    assert_eq!(positions[0].open_qty, 3);
    assert_eq!(positions[0].price_paid, d("1600"));

    // The allowance is spent, so the rest is taxed in full.
    let sell = ledger
        .sell(first.trade_id, d("150"), d("1"), day(7))
        .await
        .unwrap();
    assert_eq!(sell.qty, 3);
    assert_eq!(sell.gain, d("89"));
    assert_eq!(sell.tax, d("22.25"));
    assert_eq!(sell.total_price, d("426.75"));

    assert!(ledger.open_positions().await.unwrap().is_empty());
    assert_eq!(
        ledger.tax_state().await.unwrap(),
        TaxState::new(d("0"), d("0"), d("0.25"))
    );

    let recent = ledger.recent_transactions(10).await.unwrap();
    let kinds: Vec<EventKind> = recent.iter().map(|row| row.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Sell,
            EventKind::PartialSell,
            EventKind::Rebuy,
            EventKind::Buy,
        ]
    );
}

#[tokio::test]
async fn test_different_strikes_open_separate_trades() {
    let (ledger, _temp) = setup().await;

    let near = ledger
        .record_buy(&knock_out_cert("18000"), day(1), d("100"), 10, d("0"))
        .await
        .unwrap();
    let far = ledger
        .record_buy(&knock_out_cert("19000"), day(2), d("50"), 5, d("0"))
        .await
        .unwrap();
    assert_ne!(near.trade_id, far.trade_id);
    assert_ne!(near.instrument.id, far.instrument.id);

    let positions = ledger.open_positions().await.unwrap();
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0].trade_id, near.trade_id);
    assert_eq!(positions[0].open_qty, 10);
    assert_eq!(positions[0].price_paid, d("1000"));
    assert_eq!(positions[1].trade_id, far.trade_id);
    assert_eq!(positions[1].open_qty, 5);
    assert_eq!(positions[1].price_paid, d("250"));
    assert_eq!(positions[1].instrument.strike, d("19000"));
}

#[tokio::test]
async fn test_report_aggregates_volume_wins_and_losses() {
    let (ledger, _temp) = setup().await;

    let receipt = ledger
        .record_buy(&knock_out_cert("18000"), day(1), d("100"), 10, d("0"))
        .await
        .unwrap();
    ledger
        .partial_sell(receipt.trade_id, 7, d("130"), d("0"), day(3))
        .await
        .unwrap();
    ledger.knock_out(receipt.trade_id, day(5)).await.unwrap();

    let report = ledger.portfolio_report().await.unwrap();
    let metrics = &report.metrics;

    // Buy 1000 and partial proceeds 910; the knock-out pays nothing.
    assert_eq!(metrics.total_volume, d("1910"));
    // +210 on the partial, -1000 on the knock-out.
    assert_eq!(metrics.realized_gain, d("-790"));
    assert_eq!(metrics.total_tax, d("0"));
    assert_eq!(metrics.closed_events, 2);
    assert_eq!(metrics.win_rate, Some(d("50")));
    assert_eq!(metrics.avg_gain, Some(d("-395")));
    assert!(report.open_positions.is_empty());
}

#[tokio::test]
async fn test_losses_offset_later_gains_before_the_rate_applies() {
    let (ledger, _temp) = setup().await;
    ledger
        .set_tax_state(&TaxState::new(d("0"), d("0"), d("0.25")))
        .await
        .unwrap();

    let receipt = ledger
        .record_buy(&knock_out_cert("18000"), day(1), d("100"), 10, d("0"))
        .await
        .unwrap();

    let loss = ledger
        .partial_sell(receipt.trade_id, 5, d("60"), d("0"), day(3))
        .await
        .unwrap();
    assert_eq!(loss.gain, d("-200"));
    assert_eq!(loss.tax, d("0"));
    assert_eq!(
        ledger.tax_state().await.unwrap().loss_carryforward,
        d("200")
    );

    // 400 gain, 200 eaten by the carryforward, 25% on the rest.
    let gain = ledger
        .partial_sell(receipt.trade_id, 5, d("180"), d("0"), day(6))
        .await
        .unwrap();
    assert_eq!(gain.gain, d("400"));
    assert_eq!(gain.tax, d("50"));
    assert_eq!(gain.total_price, d("850"));
    assert_eq!(
        ledger.tax_state().await.unwrap(),
        TaxState::new(d("0"), d("0"), d("0.25"))
    );
}

#[tokio::test]
async fn test_committed_close_matches_its_preview() {
    let (ledger, _temp) = setup().await;

    let receipt = ledger
        .record_buy(&knock_out_cert("18000"), day(1), d("100"), 10, d("0"))
        .await
        .unwrap();

    let preview = ledger
        .preview_partial_sell(receipt.trade_id, 4, d("110"), d("1"), day(3))
        .await
        .unwrap();
    let record = ledger.commit(&preview).await.unwrap();

    assert_eq!(record, preview.closing_transaction());
    assert_eq!(record.gain, d("39"));

    let recent = ledger.recent_transactions(1).await.unwrap();
    assert_eq!(recent[0].kind, EventKind::PartialSell);
    assert_eq!(recent[0].gain, d("39"));
}
