//! JSON-RPC 2.0 endpoints over a real TCP socket.
//!
//! Listener wiring stays outside the endpoint: accept a connection, wrap
//! it in a codec, hand the codec to an endpoint, serve. Both sides of the
//! socket get a full endpoint, so the "server" can call the "client" too.
//!
//! Run with: `cargo run --example tcp_pair -p tandem`

use std::sync::Arc;

use tandem::prelude::*;
use tokio::net::{TcpListener, TcpStream};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    println!("listening on {addr}");

    let accept = tokio::spawn(async move {
        let (socket, peer) = listener.accept().await?;
        println!("accepted connection from {peer}");

        let ep = Arc::new(Endpoint::new(JsonRpc2Codec::new(socket)));
        ep.handle("add", |ep, (a, b): (i64, i64)| async move {
            // Ask the caller to double-check our arithmetic.
            let verified: bool = ep
                .call("verify", &(a, b, a + b))
                .await
                .map_err(WireError::internal)?;
            println!("  server: add({a}, {b}) verified={verified}");
            Ok(a + b)
        });
        ep.serve().await?;
        Ok::<_, Box<dyn std::error::Error + Send + Sync>>(())
    });

    let socket = TcpStream::connect(addr).await?;
    let client = Arc::new(Endpoint::new(JsonRpc2Codec::new(socket)));
    client.handle("verify", |_ep, (a, b, sum): (i64, i64, i64)| async move {
        Ok(a + b == sum)
    });
    tokio::spawn(client.clone().serve());

    let sum: i64 = client.call("add", &(19, 23)).await?;
    println!("19 + 23 = {sum}");

    client.close().await?;
    let accept_result: Result<(), Box<dyn std::error::Error + Send + Sync>> = accept.await?;
    accept_result.map_err(|e| e as Box<dyn std::error::Error>)?;
    Ok(())
}
