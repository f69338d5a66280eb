/*! Integration tests for Sediment.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - registry: Tests for the Registry store (inheritance, groups, caching)
 * - loader: Tests for file and directory loading, includes, keywords
 * - notify: Tests for change observation and patch delivery
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("sediment=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod notify;
