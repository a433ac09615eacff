//! Basic example demonstrating bidirectional RPC in one process.
//!
//! This example shows:
//! - Registering handlers on both peers
//! - A server handler calling back to the client mid-request
//! - Notifications
//!
//! Run with: `cargo run --example calculator -p tandem`

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tandem::prelude::*;

#[derive(Debug, Serialize, Deserialize)]
struct Args {
    a: i64,
    b: i64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn std::error::Error>> {
    // Two endpoints joined by an in-memory duplex pipe.
    let (a, b) = BinaryCodec::pair();
    let client = Arc::new(Endpoint::new(a));
    let server = Arc::new(Endpoint::new(b));

    // The client exposes "mult" for the server to call back on.
    client.handle("mult", |_ep, args: Args| async move {
        println!("  client: mult({}, {})", args.a, args.b);
        Ok(args.a * args.b)
    });

    // The server's "add" consults the calling client before answering.
    server.handle("add", |ep, args: Args| async move {
        println!("  server: add({}, {})", args.a, args.b);
        let product: i64 = ep
            .call("mult", &Args { a: 2, b: 3 })
            .await
            .map_err(WireError::internal)?;
        println!("  server: client says 2 * 3 = {product}");
        Ok(args.a + args.b)
    });

    server.handle("log", |_ep, line: String| async move {
        println!("  server: log: {line}");
        Ok(())
    });

    tokio::spawn(server.clone().serve());
    tokio::spawn(client.clone().serve());

    client.notify("log", &"starting up".to_string()).await?;

    let sum: i64 = client.call("add", &Args { a: 1, b: 2 }).await?;
    println!("1 + 2 = {sum}");

    client.close().await?;
    Ok(())
}
