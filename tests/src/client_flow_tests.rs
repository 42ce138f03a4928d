// =============================================================================
// Session flow: refresh, create, purchase and their failure paths
// =============================================================================

use crate::utils::*;
use anyhow::Result;
use marketplace_client::local::dev_account;
use marketplace_client::{Config, Error, NetworkId, ProviderError, Session, Token, Wei};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn ids(session: &Session<Arc<CountingProvider>>) -> Vec<u64> {
    session.products().iter().map(|p| p.id).collect()
}

#[tokio::test]
async fn test_refresh_excludes_sold_and_keeps_id_order() -> Result<()> {
    let session = connect_counting(
        &[("A", 10), ("B", 20), ("C", 30), ("D", 40), ("E", 50)],
        &Config::default(),
    )
    .await?;
    let ledger = &session.provider().ledger;
    for id in [2u128, 4] {
        ledger.write("purchaseProduct", &[Token::Uint(id)], &dev_account(2), Wei(id * 10))?;
    }

    let view = session.list_unsold_products().await?;
    assert!(view.iter().all(|p| !p.sold));
    assert_eq!(ids(&session), vec![1, 3, 5]);
    Ok(())
}

#[tokio::test]
async fn test_empty_catalog_gives_empty_view() -> Result<()> {
    let session = connect_counting(&[], &Config::default()).await?;
    let view = session.list_unsold_products().await?;
    assert!(view.is_empty());
    assert_eq!(session.provider().reads(), 1, "only productCount is read");
    Ok(())
}

#[tokio::test]
async fn test_connect_does_not_touch_contract() -> Result<()> {
    let session = connect_counting(&[("A", 1)], &Config::default()).await?;
    assert_eq!(session.provider().contract_calls(), 0);
    assert!(session.products().is_empty());
    assert_eq!(session.account(), &dev_account(1));
    assert_eq!(session.contract().network_id, DEV_NETWORK);
    Ok(())
}

#[tokio::test]
async fn test_connect_unregistered_network() -> Result<()> {
    let ledger = seeded_ledger(&[("A", 1)]);
    let registry = ledger.registry();
    let provider = Arc::new(CountingProvider::new(ledger));
    provider.report_network(NetworkId(1));

    let result = Session::connect(Arc::clone(&provider), &registry, &Config::default()).await;
    assert!(matches!(result, Err(Error::UnsupportedNetwork(NetworkId(1)))));
    assert_eq!(provider.contract_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_connect_without_accounts() -> Result<()> {
    let ledger = Arc::new(marketplace_client::LocalLedger::new(DEV_NETWORK, vec![]));
    let registry = ledger.registry();
    let result = Session::connect(ledger, &registry, &Config::default()).await;
    let err = result.err().expect("connect must fail");
    assert!(matches!(err, Error::ProviderUnavailable(_)));
    assert!(err.user_message().contains("wallet"));
    Ok(())
}

#[tokio::test]
async fn test_invalid_create_makes_no_provider_calls() -> Result<()> {
    let session = connect_counting(&[], &Config::default()).await?;

    for (name, price) in [("", 10), ("   ", 10), ("Widget", -1)] {
        let err = session.create_product(name, price).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{name:?} {price}: {err}");
    }
    assert_eq!(session.provider().contract_calls(), 0);
    assert_eq!(session.provider().ledger.product_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_create_adds_exactly_one_listing() -> Result<()> {
    let session = connect_counting(&[("Lamp", 5)], &Config::default()).await?;
    let before = session.list_unsold_products().await?;

    let confirmation = session.create_product("Widget", 100).await?;
    assert!(confirmation.tx_id.starts_with("0x"));

    let after = session.products();
    assert_eq!(after.len(), before.len() + 1);
    let widgets: Vec<_> = after.iter().filter(|p| p.name == "Widget").collect();
    assert_eq!(widgets.len(), 1);
    assert_eq!(widgets[0].price, Wei(100));
    assert!(!widgets[0].sold);
    assert_eq!(widgets[0].owner.as_deref(), Some(dev_account(1).as_str()));
    Ok(())
}

#[tokio::test]
async fn test_create_accepts_zero_price() -> Result<()> {
    let session = connect_counting(&[], &Config::default()).await?;
    session.create_product("Freebie", 0).await?;
    assert_eq!(session.products()[0].price, Wei::ZERO);
    Ok(())
}

#[tokio::test]
async fn test_buy_removes_product_from_view() -> Result<()> {
    let session = connect_counting(
        &[("A", 10), ("B", 20), ("C", 50), ("D", 40)],
        &Config::default(),
    )
    .await?;
    session.list_unsold_products().await?;

    session.buy_product(3, Wei(50)).await?;
    assert!(session.find_product(3).is_none());
    assert_eq!(ids(&session), vec![1, 2, 4]);
    assert_eq!(session.provider().writes(), 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_buys_allow_one_write() -> Result<()> {
    let session = connect_counting(&[("A", 10), ("B", 20)], &Config::default()).await?;
    session.list_unsold_products().await?;

    let (first, second) = tokio::join!(
        session.buy_product(1, Wei(10)),
        session.buy_product(2, Wei(20))
    );

    let outcomes = [&first, &second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(Error::OperationInProgress)))
            .count(),
        1
    );
    assert_eq!(session.provider().writes(), 1);
    Ok(())
}

#[tokio::test]
async fn test_write_slot_free_after_completion() -> Result<()> {
    let session = connect_counting(&[("A", 10), ("B", 20)], &Config::default()).await?;
    session.list_unsold_products().await?;
    session.buy_product(1, Wei(10)).await?;
    session.buy_product(2, Wei(20)).await?;
    assert!(session.products().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_rejected_buy_leaves_view_identical() -> Result<()> {
    let session = connect_counting(&[("A", 10), ("B", 20)], &Config::default()).await?;
    let before = session.list_unsold_products().await?;
    let reads_before = session.provider().reads();

    session
        .provider()
        .reject_next_write(ProviderError::Rejected("User denied transaction signature".into()));
    let err = session.buy_product(2, Wei(20)).await.unwrap_err();

    assert!(matches!(err, Error::TransactionFailed(ProviderError::Rejected(_))));
    let after = session.products();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(*before, *after);
    assert_eq!(session.provider().reads(), reads_before, "no refresh after a failed write");
    Ok(())
}

#[tokio::test]
async fn test_buy_of_product_sold_elsewhere_is_transaction_failure() -> Result<()> {
    let session = connect_counting(&[("A", 10)], &Config::default()).await?;
    session.list_unsold_products().await?;
    session
        .provider()
        .ledger
        .write("purchaseProduct", &[Token::Uint(1)], &dev_account(3), Wei(10))?;

    let err = session.buy_product(1, Wei(10)).await.unwrap_err();
    match err {
        Error::TransactionFailed(cause) => assert!(cause.to_string().contains("already sold")),
        other => panic!("expected TransactionFailed, got {other:?}"),
    }
    assert_eq!(ids(&session), vec![1]);
    Ok(())
}

#[tokio::test]
async fn test_buy_validates_against_view() -> Result<()> {
    let session = connect_counting(&[("A", 10)], &Config::default()).await?;
    session.list_unsold_products().await?;

    assert!(matches!(session.buy_product(7, Wei(10)).await, Err(Error::InvalidInput(_))));
    assert!(matches!(session.buy_product(1, Wei(9)).await, Err(Error::InvalidInput(_))));
    assert_eq!(session.provider().writes(), 0);
    Ok(())
}

#[tokio::test]
async fn test_failed_read_keeps_previous_view() -> Result<()> {
    let session = connect_counting(&[("A", 10), ("B", 20), ("C", 30)], &Config::default()).await?;
    let before = session.list_unsold_products().await?;

    session.provider().tamper_reads(|method, args, result| {
        if method == "products" && args == [Token::Uint(2)] {
            Err(ProviderError::Transport("connection reset".into()))
        } else {
            Ok(result)
        }
    });
    let err = session.list_unsold_products().await.unwrap_err();
    assert!(matches!(err, Error::SyncFailure { committed: None, .. }));
    assert!(Arc::ptr_eq(&before, &session.products()));

    session.provider().clear_tamper();
    assert_eq!(session.list_unsold_products().await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_refresh_failure_after_write_reports_commit() -> Result<()> {
    let session = connect_counting(&[("A", 10)], &Config::default()).await?;
    session.list_unsold_products().await?;
    session.provider().tamper_reads(|method, _, result| {
        if method == "productCount" {
            Err(ProviderError::Timeout("node busy".into()))
        } else {
            Ok(result)
        }
    });

    let err = session.create_product("Widget", 100).await.unwrap_err();
    match &err {
        Error::SyncFailure {
            committed: Some(confirmation),
            ..
        } => assert!(err.user_message().contains(&confirmation.tx_id)),
        other => panic!("expected SyncFailure with commit, got {other:?}"),
    }
    assert_eq!(session.provider().ledger.product_count(), 2, "write stays committed");
    Ok(())
}

#[tokio::test]
async fn test_non_contiguous_ids_are_sync_failure() -> Result<()> {
    let session = connect_counting(&[("A", 10), ("B", 20)], &Config::default()).await?;
    session.provider().tamper_reads(|method, args, mut result| {
        if method == "products" && args == [Token::Uint(2)] {
            result[0] = Token::Uint(5);
        }
        Ok(result)
    });

    let err = session.list_unsold_products().await.unwrap_err();
    assert!(matches!(err, Error::SyncFailure { .. }));
    assert!(err.to_string().contains("contiguous"));
    Ok(())
}

#[tokio::test]
async fn test_shrinking_count_is_sync_failure() -> Result<()> {
    let session = connect_counting(&[("A", 10), ("B", 20)], &Config::default()).await?;
    session.list_unsold_products().await?;
    session.provider().tamper_reads(|method, _, result| {
        if method == "productCount" {
            Ok(vec![Token::Uint(1)])
        } else {
            Ok(result)
        }
    });

    let err = session.list_unsold_products().await.unwrap_err();
    assert!(err.to_string().contains("backwards"));
    assert_eq!(session.products().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_refresh_reads_are_bounded() -> Result<()> {
    let products: Vec<(String, u128)> = (1..=12).map(|i| (format!("P{i}"), i)).collect();
    let products: Vec<(&str, u128)> = products.iter().map(|(n, p)| (n.as_str(), *p)).collect();
    let config = Config {
        read_concurrency: 3,
        ..Config::default()
    };
    let session = connect_counting(&products, &config).await?;

    let view = session.list_unsold_products().await?;
    assert_eq!(view.len(), 12);
    assert_eq!(session.provider().reads(), 13);
    let peak = session.provider().max_in_flight_reads();
    assert!((1..=3).contains(&peak), "peak in-flight reads {peak}");
    Ok(())
}

#[tokio::test]
async fn test_out_of_order_completion_keeps_ascending_ids() -> Result<()> {
    let products: Vec<(String, u128)> = (1..=6).map(|i| (format!("P{i}"), i * 10)).collect();
    let products: Vec<(&str, u128)> = products.iter().map(|(n, p)| (n.as_str(), *p)).collect();
    let config = Config {
        read_concurrency: 6,
        ..Config::default()
    };
    let session = connect_counting(&products, &config).await?;
    // Lower ids answer last.
    session.provider().delay_reads(|method, args| match args.first().and_then(Token::as_uint) {
        Some(id) if method == "products" => Duration::from_millis(((7 - id) * 15) as u64),
        _ => Duration::ZERO,
    });

    session.list_unsold_products().await?;

    assert_eq!(session.provider().completed_product_reads(), vec![6, 5, 4, 3, 2, 1]);
    assert!(session.provider().max_in_flight_reads() > 1);
    assert_eq!(ids(&session), vec![1, 2, 3, 4, 5, 6]);
    Ok(())
}

#[tokio::test]
async fn test_write_during_follow_up_refresh_is_rejected() -> Result<()> {
    let session = connect_counting(&[("A", 10), ("B", 20)], &Config::default()).await?;
    session.list_unsold_products().await?;
    session
        .provider()
        .delay_reads(|_, _| Duration::from_millis(50));

    // The first write commits at once; the second arrives while its refresh runs.
    let (first, second) = tokio::join!(session.buy_product(1, Wei(10)), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.buy_product(2, Wei(20)).await
    });

    assert!(first.is_ok(), "{first:?}");
    assert!(matches!(second, Err(Error::OperationInProgress)), "{second:?}");
    assert_eq!(session.provider().writes(), 1);
    assert_eq!(ids(&session), vec![2]);
    Ok(())
}

#[tokio::test]
async fn test_slow_refresh_does_not_overwrite_newer_view() -> Result<()> {
    let session = connect_counting(&[("A", 10), ("B", 20)], &Config::default()).await?;
    session.list_unsold_products().await?;

    let slow = Arc::new(AtomicBool::new(true));
    let slow_reads = Arc::clone(&slow);
    session.provider().delay_reads(move |method, _| {
        if method == "products" && slow_reads.load(Ordering::SeqCst) {
            Duration::from_millis(80)
        } else {
            Duration::ZERO
        }
    });

    // The plain refresh reads both products as unsold, then stalls while the
    // purchase of product 2 commits and refreshes quickly.
    let (stale, bought) = tokio::join!(session.list_unsold_products(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        slow.store(false, Ordering::SeqCst);
        session.buy_product(2, Wei(20)).await
    });
    bought?;

    let sold = session.provider().ledger.read("products", &[Token::Uint(2)])?;
    assert_eq!(sold[4], Token::Bool(true));
    assert_eq!(ids(&session), vec![1]);
    let returned: Vec<u64> = stale?.iter().map(|p| p.id).collect();
    assert_eq!(returned, vec![1]);
    Ok(())
}
