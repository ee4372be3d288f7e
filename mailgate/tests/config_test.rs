use mailgate::config::{Config, EnvConfig};

// Each test uses its own prefix so parallel tests do not see each other's variables.
fn set_required(prefix: &str) {
    for (key, value) in [
        ("AUTH_TOKEN", "secret"),
        ("SMTP_HOST", "smtp.example.com"),
        ("SMTP_PORT", "465"),
        ("SMTP_USERNAME", "relay"),
        ("SMTP_PASSWORD", "hunter2"),
        ("SMTP_IDENTITY", "relay@example.com"),
        ("SMTP_FROM", "noreply@example.com"),
    ] {
        std::env::set_var(format!("{}_{}", prefix, key), value);
    }
}

fn clear(prefix: &str) {
    for (key, _) in std::env::vars() {
        if key.starts_with(&format!("{}_", prefix)) {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn loads_required_fields_and_defaults() {
    set_required("MGCFG_A");

    let config = Config::from_env_with_prefix("MGCFG_A").unwrap();

    assert_eq!(config.auth_token, "secret");
    assert_eq!(config.smtp_host, "smtp.example.com");
    assert_eq!(config.smtp_port, 465);
    assert_eq!(config.smtp_username, "relay");
    assert_eq!(config.smtp_password, "hunter2");
    assert_eq!(config.smtp_identity, "relay@example.com");
    assert_eq!(config.smtp_from, "noreply@example.com");
    assert_eq!(config.listen_addr, "0.0.0.0:8080");
    assert_eq!(config.smtp_timeout_secs, 30);
    assert_eq!(config.max_body_bytes, 65536);
    assert_eq!(config.smtp_addr(), "smtp.example.com:465");

    clear("MGCFG_A");
}

#[test]
fn optional_fields_override_defaults() {
    set_required("MGCFG_B");
    std::env::set_var("MGCFG_B_LISTEN_ADDR", ":3030");
    std::env::set_var("MGCFG_B_SMTP_TIMEOUT_SECS", "5");
    std::env::set_var("MGCFG_B_MAX_BODY_BYTES", "4096");

    let config = Config::from_env_with_prefix("MGCFG_B").unwrap();

    assert_eq!(config.bind_addr(), "0.0.0.0:3030");
    assert_eq!(config.smtp_timeout().as_secs(), 5);
    assert_eq!(config.max_body_bytes, 4096);

    clear("MGCFG_B");
}

#[test]
fn missing_required_field_is_an_error() {
    set_required("MGCFG_C");
    std::env::remove_var("MGCFG_C_SMTP_PASSWORD");

    let err = Config::from_env_with_prefix("MGCFG_C").unwrap_err();
    assert!(err.to_string().contains("smtp_password"));

    clear("MGCFG_C");
}

#[test]
fn non_numeric_port_is_an_error() {
    set_required("MGCFG_D");
    std::env::set_var("MGCFG_D_SMTP_PORT", "smtps");

    assert!(Config::from_env_with_prefix("MGCFG_D").is_err());

    clear("MGCFG_D");
}

#[test]
fn port_out_of_range_is_an_error() {
    set_required("MGCFG_E");
    std::env::set_var("MGCFG_E_SMTP_PORT", "70000");

    assert!(Config::from_env_with_prefix("MGCFG_E").is_err());

    clear("MGCFG_E");
}
