// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::*;

fn parse(extra: &[&str]) -> anyhow::Result<AgentConfig> {
    let mut args =
        vec!["trex-agent", "--server-ip", "10.0.0.5", "--org", "orgX", "--password", "pw"];
    args.extend_from_slice(extra);
    Ok(AgentConfig::try_parse_from(args)?)
}

#[test]
fn defaults() -> anyhow::Result<()> {
    let config = parse(&[])?;
    config.validate()?;
    assert_eq!(config.http_base(), "http://10.0.0.5:8000");
    assert_eq!(config.ws_base(), "ws://10.0.0.5:8000");
    assert_eq!(config.retry_policy(), RetryPolicy::default());
    assert!(config.identity.is_none());
    Ok(())
}

#[test]
fn session_settings_use_tunables() -> anyhow::Result<()> {
    let config = parse(&["--control-tick-secs", "7", "--expiry-buffer-secs", "3"])?;
    let identity = Identity::normalize("ABC123").ok_or_else(|| anyhow::anyhow!("blank"))?;
    let settings = config.session_settings(identity);
    assert_eq!(settings.identity.as_str(), "abc123");
    assert_eq!(settings.org, "orgX");
    assert_eq!(settings.control_tick, Duration::from_secs(7));
    assert_eq!(settings.expiry_buffer, Duration::from_secs(3));
    Ok(())
}

#[yare::parameterized(
    zero_retries = { &["--max-retries", "0"] },
    flat_backoff = { &["--backoff-factor", "1"] },
    zero_tick = { &["--control-tick-secs", "0"] },
    blank_identity = { &["--identity", "  "] },
    amqp_broker = { &["--broker-url", "amqp://localhost"] },
    bad_log_format = { &["--log-format", "xml"] },
)]
fn invalid(extra: &[&str]) {
    let config = parse(extra);
    assert!(config.is_ok_and(|c| c.validate().is_err()));
}

#[test]
fn blank_org_is_invalid() -> anyhow::Result<()> {
    let mut config = parse(&[])?;
    config.org = "   ".to_owned();
    assert!(config.validate().is_err());
    Ok(())
}

#[test]
fn memory_broker_is_accepted() -> anyhow::Result<()> {
    let config = parse(&["--broker-url", "memory://"])?;
    config.validate()?;
    assert!(config.uses_memory_broker());
    Ok(())
}
