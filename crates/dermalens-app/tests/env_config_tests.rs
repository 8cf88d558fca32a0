//! Integration tests for reading configuration from the process environment.

use dermalens_app::AppConfig;

#[test]
fn env_config_tests_reads_process_environment() {
    // Safety:
    // - This test binary holds a single test, so no other thread reads env.
    // - Variables are removed before returning.
    unsafe {
        std::env::set_var("DERMALENS_API_KEY", "from-env");
        std::env::set_var("DERMALENS_LOG", "warn");
    }

    let config = AppConfig::from_env().expect("config should load");
    assert_eq!(config.service.api_key(), "from-env");
    assert_eq!(config.log_filter, "warn");

    // Safety: see rationale above.
    unsafe {
        std::env::remove_var("DERMALENS_API_KEY");
        std::env::remove_var("DERMALENS_LOG");
    }
}
