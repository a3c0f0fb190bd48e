//! Tape file layout tests: directories, names and headers on real disk.

use exchange_rs::tape::{ProfitSnapshot, TapeStore};
use exchange_rs::CsvRecord;
use exchange_rs::Trade;

#[test]
fn test_open_creates_artifact_directories_and_files() {
    let dir = tempfile::tempdir().unwrap();
    let tickers = vec!["X".to_string(), "Y".to_string()];

    let mut store = TapeStore::open(dir.path(), "TESTX", &tickers).unwrap();
    store
        .ticker_tapes_mut("X")
        .unwrap()
        .profits
        .append(&ProfitSnapshot {
            agent_name: "zic_1".to_string(),
            profit: 2.5,
        });
    store.flush_all();

    for sub in ["trades", "market_data", "lob_snapshots", "profits", "messages"] {
        assert!(dir.path().join(sub).is_dir(), "missing directory {sub}");
    }

    // One file per ticker per artifact, named with exchange and ticker.
    let trades: Vec<_> = std::fs::read_dir(dir.path().join("trades"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(trades.len(), 2);
    assert!(trades.iter().all(|name| name.starts_with("trades_TESTX_")));
    assert!(trades.iter().any(|name| name.contains("_X_")));
    assert!(trades.iter().any(|name| name.contains("_Y_")));

    // The appended profit row landed with its header.
    let profits: Vec<_> = std::fs::read_dir(dir.path().join("profits"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.file_name().unwrap().to_string_lossy().contains("_X_"))
        .collect();
    let contents = std::fs::read_to_string(&profits[0]).unwrap();
    assert!(contents.starts_with("agent_name,profit\n"));
    assert!(contents.contains("zic_1,2.5"));
}

#[test]
fn test_trade_csv_schema_is_stable() {
    // The downstream analysis notebooks key on these exact columns.
    assert_eq!(
        Trade::headers(),
        "id,ticker,quantity,price,timestamp,buyer_id,seller_id,buyer_name,seller_name,\
         aggressing_order_id,resting_order_id,buyer_priv_value,seller_priv_value,\
         buyer_profit,seller_profit"
    );
}
