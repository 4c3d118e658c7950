//! Test module organization
//!
//! This module re-exports test helpers for use in test files.

mod helpers;

#[allow(unused_imports)]
pub use helpers::{
    binance_credentials, bitget_credentials, build_test_config, build_test_config_with_mock_server,
    call_count, exchange_config, test_client, test_client_with_timeout, StaticAdapter, DUMMY_API_KEY,
    DUMMY_API_SECRET, DUMMY_LOGO, DUMMY_PASSPHRASE,
};

#[allow(unused_imports)]
pub use helpers_mock_server::{
    binance_history_body, binance_list_body, bitget_body, bitget_error_body, bybit_body, bybit_error_body,
    mount_binance_history, mount_binance_history_status, mount_binance_list, mount_bitget,
    mount_bybit, mount_okx_history, mount_okx_summary, mount_slow, okx_error_body,
    okx_history_body, okx_summary_body, BINANCE_HISTORY_PATH, BINANCE_LIST_PATH,
    BITGET_PRODUCT_PATH, BYBIT_PRODUCT_PATH, OKX_HISTORY_PATH, OKX_SUMMARY_PATH,
};
