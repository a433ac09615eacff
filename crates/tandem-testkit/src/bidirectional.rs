//! Bidirectional RPC scenarios: both peers register handlers, and handlers
//! call back to the peer whose request they are serving.

use tandem_core::WireError;

use crate::{served_pair, Args, CodecFactory, TestError};

/// Scenarios where the callee turns around and calls the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidirectionalScenario {
    /// The arithmetic handshake: the server's `add` handler calls the
    /// client's `mult` mid-request and only then answers.
    NestedCallback,

    /// The nested call goes several levels deep before unwinding.
    DeeplyNestedCallback,

    /// Both peers call each other's methods concurrently.
    CrossfireCalls,
}

/// Run a bidirectional RPC scenario, panicking on failure.
pub async fn run_bidirectional_scenario<F: CodecFactory>(scenario: BidirectionalScenario) {
    let result = match scenario {
        BidirectionalScenario::NestedCallback => run_nested_callback::<F>().await,
        BidirectionalScenario::DeeplyNestedCallback => run_deeply_nested::<F>().await,
        BidirectionalScenario::CrossfireCalls => run_crossfire::<F>().await,
    };

    if let Err(e) = result {
        panic!("bidirectional scenario {scenario:?} failed: {e}");
    }
}

async fn run_nested_callback<F: CodecFactory>() -> Result<(), TestError> {
    let (client, server) = served_pair::<F>().await?;

    client.handle("mult", |_ep, args: Args| async move { Ok(args.a * args.b) });
    server.handle("add", |ep, args: Args| async move {
        let product: i64 = ep
            .call("mult", &Args { a: 2, b: 3 })
            .await
            .map_err(|e| WireError::internal(format!("callback failed: {e}")))?;
        if product != 6 {
            return Err(WireError::internal(format!(
                "expected mult(2, 3) = 6, got {product}"
            )));
        }
        Ok(args.a + args.b)
    });

    let sum: i64 = client.call("add", &Args { a: 1, b: 2 }).await?;
    if sum != 3 {
        return Err(TestError::Assertion(format!(
            "expected add(1, 2) = 3, got {sum}"
        )));
    }
    if client.pending_count() != 0 || server.pending_count() != 0 {
        return Err(TestError::Assertion(format!(
            "pending entries linger: client={:?} server={:?}",
            client.pending_seqs(),
            server.pending_seqs()
        )));
    }
    Ok(())
}

async fn run_deeply_nested<F: CodecFactory>() -> Result<(), TestError> {
    let (client, server) = served_pair::<F>().await?;

    // Each peer's `countdown` calls the other's until n reaches zero, so
    // the call chain ping-pongs over the same connection.
    client.handle("countdown", |ep, n: i64| async move {
        if n == 0 {
            return Ok(0i64);
        }
        let rest: i64 = ep
            .call("countdown", &(n - 1))
            .await
            .map_err(|e| WireError::internal(format!("nested call failed: {e}")))?;
        Ok(rest + 1)
    });
    server.handle("countdown", |ep, n: i64| async move {
        if n == 0 {
            return Ok(0i64);
        }
        let rest: i64 = ep
            .call("countdown", &(n - 1))
            .await
            .map_err(|e| WireError::internal(format!("nested call failed: {e}")))?;
        Ok(rest + 1)
    });

    let depth: i64 = client.call("countdown", &6i64).await?;
    if depth != 6 {
        return Err(TestError::Assertion(format!("expected 6, got {depth}")));
    }
    Ok(())
}

async fn run_crossfire<F: CodecFactory>() -> Result<(), TestError> {
    let (client, server) = served_pair::<F>().await?;

    client.handle("mult", |_ep, args: Args| async move { Ok(args.a * args.b) });
    server.handle("add", |_ep, args: Args| async move { Ok(args.a + args.b) });

    let from_client = {
        let client = client.clone();
        tokio::spawn(async move {
            let mut sums = Vec::new();
            for i in 0..8i64 {
                let sum: i64 = client.call("add", &Args { a: i, b: 1 }).await?;
                sums.push(sum);
            }
            Ok::<_, tandem_core::RpcError>(sums)
        })
    };
    let from_server = {
        let server = server.clone();
        tokio::spawn(async move {
            let mut products = Vec::new();
            for i in 0..8i64 {
                let product: i64 = server.call("mult", &Args { a: i, b: 2 }).await?;
                products.push(product);
            }
            Ok::<_, tandem_core::RpcError>(products)
        })
    };

    let sums = from_client
        .await
        .map_err(|e| TestError::Setup(format!("client task panicked: {e}")))??;
    let products = from_server
        .await
        .map_err(|e| TestError::Setup(format!("server task panicked: {e}")))??;

    let expected_sums: Vec<i64> = (0..8).map(|i| i + 1).collect();
    let expected_products: Vec<i64> = (0..8).map(|i| i * 2).collect();
    if sums != expected_sums {
        return Err(TestError::Assertion(format!(
            "expected sums {expected_sums:?}, got {sums:?}"
        )));
    }
    if products != expected_products {
        return Err(TestError::Assertion(format!(
            "expected products {expected_products:?}, got {products:?}"
        )));
    }
    Ok(())
}
