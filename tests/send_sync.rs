//! Send/Sync guarantees for core types.

use logship::{
    JsonEncoder, LogObserver, LogRecord, LogstashHandler, LogstashHandlerBuilder, TcpConnector,
    socket_handler::{DeliveryQueue, Frame},
};
use rstest::rstest;
use static_assertions::assert_impl_all;

#[rstest]
fn builders_are_send_sync() {
    assert_impl_all!(LogstashHandlerBuilder: Send, Sync);
}

#[rstest]
fn components_are_send_sync() {
    assert_impl_all!(LogstashHandler: Send, Sync);
    assert_impl_all!(DeliveryQueue: Send, Sync);
    assert_impl_all!(Frame: Send, Sync, Clone);
    assert_impl_all!(JsonEncoder: Send, Sync);
    assert_impl_all!(LogObserver: Send, Sync);
    assert_impl_all!(LogRecord: Send, Sync);
    assert_impl_all!(TcpConnector: Send);
}
