// =============================================================================
// JSON-RPC provider against a mock node
// =============================================================================

use crate::utils::*;
use anyhow::Result;
use marketplace_client::local::dev_account;
use marketplace_client::{
    Config, Error, JsonRpcProvider, Provider, ProviderError, Session, Token, Wei, WriteOptions,
};

#[tokio::test]
async fn test_accounts_and_network() -> Result<()> {
    let (url, node) = spawn_mock_node(&[], MockNodeOptions::default()).await?;
    let provider = JsonRpcProvider::new(&rpc_config(&url))?;

    let accounts = provider.request_accounts().await?;
    assert_eq!(accounts.len(), 3);
    assert_eq!(accounts[0], dev_account(1));
    assert_eq!(provider.current_network_id().await?, DEV_NETWORK);
    assert_eq!(node.methods_called(), vec!["eth_requestAccounts", "net_version"]);
    Ok(())
}

#[tokio::test]
async fn test_accounts_fall_back_to_eth_accounts() -> Result<()> {
    let options = MockNodeOptions {
        legacy_accounts: true,
        ..Default::default()
    };
    let (url, node) = spawn_mock_node(&[], options).await?;
    let provider = JsonRpcProvider::new(&rpc_config(&url))?;

    assert_eq!(provider.request_accounts().await?.len(), 3);
    assert_eq!(node.methods_called(), vec!["eth_requestAccounts", "eth_accounts"]);
    Ok(())
}

#[tokio::test]
async fn test_no_accounts_is_unavailable() -> Result<()> {
    let options = MockNodeOptions {
        no_accounts: true,
        ..Default::default()
    };
    let (url, node) = spawn_mock_node(&[], options).await?;
    let provider = JsonRpcProvider::new(&rpc_config(&url))?;
    let registry = node.ledger.registry();

    let result = Session::connect(provider, &registry, &rpc_config(&url)).await;
    assert!(matches!(result, Err(Error::ProviderUnavailable(_))));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_node_is_unavailable() -> Result<()> {
    // Bind and drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}", listener.local_addr()?);
    drop(listener);

    let provider = JsonRpcProvider::new(&rpc_config(&url))?;
    let err = provider.request_accounts().await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(_)), "{err}");
    Ok(())
}

#[tokio::test]
async fn test_call_read_decodes_product() -> Result<()> {
    let (url, node) = spawn_mock_node(&[("Lamp", 1_500)], MockNodeOptions::default()).await?;
    let provider = JsonRpcProvider::new(&rpc_config(&url))?;
    let contract = node.ledger.registry().resolve(DEV_NETWORK).expect("registered");

    let count = provider.call_read(&contract, "productCount", &[]).await?;
    assert_eq!(count, vec![Token::Uint(1)]);

    let product = provider.call_read(&contract, "products", &[Token::Uint(1)]).await?;
    assert_eq!(product[1], Token::String("Lamp".into()));
    assert_eq!(product[2], Token::Uint(1_500));
    assert_eq!(product[4], Token::Bool(false));
    Ok(())
}

#[tokio::test]
async fn test_submit_write_polls_receipt() -> Result<()> {
    let options = MockNodeOptions {
        receipt_delay: 2,
        ..Default::default()
    };
    let (url, node) = spawn_mock_node(&[("Lamp", 1_500)], options).await?;
    let provider = JsonRpcProvider::new(&rpc_config(&url))?;
    let contract = node.ledger.registry().resolve(DEV_NETWORK).expect("registered");

    let confirmation = provider
        .submit_write(
            &contract,
            "purchaseProduct",
            &[Token::Uint(1)],
            &WriteOptions {
                from: dev_account(2),
                value: Some(Wei(1_500)),
            },
        )
        .await?;
    assert_eq!(confirmation.block_number, Some(1));

    let polls = node
        .methods_called()
        .iter()
        .filter(|m| *m == "eth_getTransactionReceipt")
        .count();
    assert_eq!(polls, 3);

    let sent = node.sent_transactions.lock().unwrap().clone();
    assert_eq!(sent[0]["value"], "0x5dc");
    assert_eq!(sent[0]["gas"], "0x1e8480");
    assert_eq!(sent[0]["from"], dev_account(2).as_str());
    Ok(())
}

#[tokio::test]
async fn test_revert_on_send_is_rejected() -> Result<()> {
    let (url, node) = spawn_mock_node(&[("Lamp", 1_500)], MockNodeOptions::default()).await?;
    let provider = JsonRpcProvider::new(&rpc_config(&url))?;
    let contract = node.ledger.registry().resolve(DEV_NETWORK).expect("registered");

    let err = provider
        .submit_write(
            &contract,
            "purchaseProduct",
            &[Token::Uint(1)],
            &WriteOptions {
                from: dev_account(2),
                value: Some(Wei(1)),
            },
        )
        .await
        .unwrap_err();
    match err {
        ProviderError::Rejected(msg) => assert!(msg.contains("incorrect payment")),
        other => panic!("expected Rejected, got {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_reverted_receipt_is_rejected() -> Result<()> {
    let options = MockNodeOptions {
        revert_receipts: true,
        ..Default::default()
    };
    let (url, node) = spawn_mock_node(&[], options).await?;
    let provider = JsonRpcProvider::new(&rpc_config(&url))?;
    let contract = node.ledger.registry().resolve(DEV_NETWORK).expect("registered");

    let err = provider
        .submit_write(
            &contract,
            "createProduct",
            &[Token::String("Chair".into()), Token::Uint(7)],
            &WriteOptions {
                from: dev_account(1),
                value: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Rejected(_)));
    Ok(())
}

#[tokio::test]
async fn test_missing_receipt_times_out() -> Result<()> {
    let options = MockNodeOptions {
        withhold_receipts: true,
        ..Default::default()
    };
    let (url, node) = spawn_mock_node(&[], options).await?;
    let config = Config {
        receipt_timeout_secs: 0,
        ..rpc_config(&url)
    };
    let provider = JsonRpcProvider::new(&config)?;
    let contract = node.ledger.registry().resolve(DEV_NETWORK).expect("registered");

    let err = provider
        .submit_write(
            &contract,
            "createProduct",
            &[Token::String("Chair".into()), Token::Uint(7)],
            &WriteOptions {
                from: dev_account(1),
                value: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Timeout(_)));
    Ok(())
}

#[tokio::test]
async fn test_full_flow_over_rpc() -> Result<()> {
    let (url, node) = spawn_mock_node(
        &[("Lamp", 50), ("Bike", 2_000)],
        MockNodeOptions {
            receipt_delay: 1,
            ..Default::default()
        },
    )
    .await?;
    let config = rpc_config(&url);
    let provider = JsonRpcProvider::new(&config)?;
    let session = Session::connect(provider, &node.ledger.registry(), &config).await?;

    let view = session.list_unsold_products().await?;
    assert_eq!(view.len(), 2);

    session.create_product("Chair", 7).await?;
    assert_eq!(session.products().len(), 3);

    session.buy_product(1, Wei(50)).await?;
    let names: Vec<String> = session.products().iter().map(|p| p.name.clone()).collect();
    assert_eq!(names, vec!["Bike", "Chair"]);
    assert_eq!(node.ledger.product_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_wrong_network_over_rpc() -> Result<()> {
    let (url, node) = spawn_mock_node(&[], MockNodeOptions::default()).await?;
    let config = rpc_config(&url);
    let registry = marketplace_client::DeploymentRegistry::new(
        marketplace_client::LocalLedger::interface(),
    )
    .with_deployment(marketplace_client::NetworkId(1), "0x0000000000000000000000000000000000000001");

    let result = Session::connect(JsonRpcProvider::new(&config)?, &registry, &config).await;
    assert!(matches!(result, Err(Error::UnsupportedNetwork(_))));
    assert!(!node.methods_called().iter().any(|m| m == "eth_call"));
    Ok(())
}
