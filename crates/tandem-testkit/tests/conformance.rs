//! Runs every shared scenario against every codec.

use tandem_core::{BinaryCodec, JsonRpc2Codec, JsonRpcCodec};
use tandem_testkit::bidirectional::{run_bidirectional_scenario, BidirectionalScenario};
use tandem_testkit::{CodecFactory, TestError};

struct BinaryFactory;

impl CodecFactory for BinaryFactory {
    type Codec = BinaryCodec<tokio::io::DuplexStream>;

    async fn connect_pair() -> Result<(Self::Codec, Self::Codec), TestError> {
        Ok(BinaryCodec::pair())
    }
}

struct JsonRpcFactory;

impl CodecFactory for JsonRpcFactory {
    type Codec = JsonRpcCodec<tokio::io::DuplexStream>;

    async fn connect_pair() -> Result<(Self::Codec, Self::Codec), TestError> {
        Ok(JsonRpcCodec::pair())
    }
}

struct JsonRpc2Factory;

impl CodecFactory for JsonRpc2Factory {
    type Codec = JsonRpc2Codec<tokio::io::DuplexStream>;

    async fn connect_pair() -> Result<(Self::Codec, Self::Codec), TestError> {
        Ok(JsonRpc2Codec::pair())
    }
}

macro_rules! codec_conformance {
    ($mod_name:ident, $factory:ty) => {
        mod $mod_name {
            use super::*;

            #[tokio::test]
            async fn call_roundtrip() {
                tandem_testkit::run_call_roundtrip::<$factory>().await;
            }

            #[tokio::test]
            async fn unknown_method() {
                tandem_testkit::run_unknown_method::<$factory>().await;
            }

            #[tokio::test]
            async fn notification_is_silent() {
                tandem_testkit::run_notification_is_silent::<$factory>().await;
            }

            #[tokio::test]
            async fn handler_panic() {
                tandem_testkit::run_handler_panic::<$factory>().await;
            }

            #[tokio::test]
            async fn shutdown_drains_pending() {
                tandem_testkit::run_shutdown_drains_pending::<$factory>().await;
            }

            #[tokio::test]
            async fn concurrent_calls() {
                tandem_testkit::run_concurrent_calls::<$factory>().await;
            }

            #[tokio::test]
            async fn nested_callback() {
                run_bidirectional_scenario::<$factory>(BidirectionalScenario::NestedCallback)
                    .await;
            }

            #[tokio::test]
            async fn deeply_nested_callback() {
                run_bidirectional_scenario::<$factory>(
                    BidirectionalScenario::DeeplyNestedCallback,
                )
                .await;
            }

            #[tokio::test]
            async fn crossfire_calls() {
                run_bidirectional_scenario::<$factory>(BidirectionalScenario::CrossfireCalls)
                    .await;
            }
        }
    };
}

codec_conformance!(binary, BinaryFactory);
codec_conformance!(jsonrpc, JsonRpcFactory);
codec_conformance!(jsonrpc2, JsonRpc2Factory);
