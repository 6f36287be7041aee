use serial_test::serial;

use freshbooks_rs::{config, error::Error, Config};

const ALL_VARS: [&str; 6] = [
    config::ENV_CLIENT_ID,
    config::ENV_CLIENT_SECRET,
    config::ENV_ACCOUNT_ID,
    config::ENV_REDIRECT_URI,
    config::ENV_TOKEN_PATH,
    config::ENV_BASE_URL,
];

fn clear_env() {
    for var in ALL_VARS {
        // SAFETY: tests touching the environment are serialized
        unsafe { std::env::remove_var(var) };
    }
}

fn set_required() {
    // SAFETY: tests touching the environment are serialized
    unsafe {
        std::env::set_var(config::ENV_CLIENT_ID, "id");
        std::env::set_var(config::ENV_CLIENT_SECRET, "secret");
        std::env::set_var(config::ENV_ACCOUNT_ID, "acct");
        std::env::set_var(config::ENV_REDIRECT_URI, "https://example.com/callback");
    }
}

#[test]
#[serial]
fn from_env_reads_required_variables_and_defaults() {
    clear_env();
    set_required();

    let config = Config::from_env().unwrap();
    assert_eq!(config.account_id, "acct");
    assert_eq!(config.key_pair.client_id(), "id");
    assert_eq!(config.key_pair.redirect_uri(), "https://example.com/callback");
    assert_eq!(config.base_url.as_str(), "https://api.freshbooks.com/");
    assert_eq!(
        config.token_path,
        std::path::PathBuf::from(config::DEFAULT_TOKEN_PATH)
    );
    clear_env();
}

#[test]
#[serial]
fn from_env_applies_overrides() {
    clear_env();
    set_required();
    // SAFETY: serialized
    unsafe {
        std::env::set_var(config::ENV_BASE_URL, "http://localhost:8080");
        std::env::set_var(config::ENV_TOKEN_PATH, "/tmp/fb-token.json");
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.base_url.as_str(), "http://localhost:8080/");
    assert_eq!(config.token_path, std::path::PathBuf::from("/tmp/fb-token.json"));
    clear_env();
}

#[test]
#[serial]
fn missing_variable_is_named_in_the_error() {
    clear_env();
    set_required();
    // SAFETY: serialized
    unsafe { std::env::remove_var(config::ENV_ACCOUNT_ID) };

    let result = Config::from_env();
    assert!(
        matches!(result, Err(Error::MissingConfig(ref name)) if name == config::ENV_ACCOUNT_ID),
        "got {result:?}"
    );
    clear_env();
}

#[test]
#[serial]
fn empty_variable_counts_as_missing() {
    clear_env();
    set_required();
    // SAFETY: serialized
    unsafe { std::env::set_var(config::ENV_CLIENT_SECRET, "") };

    let result = Config::from_env();
    assert!(matches!(result, Err(Error::MissingConfig(_))));
    clear_env();
}

#[test]
fn invalid_base_url_is_rejected() {
    let key_pair =
        freshbooks_rs::KeyPair::new("id".into(), "secret".into(), "https://example.com/cb").unwrap();
    let result = Config::new(key_pair, "acct").unwrap().with_base_url("not a url");
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
