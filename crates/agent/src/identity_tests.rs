// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const IOREG: &str = r#"+-o J314sAP  <class IOPlatformExpertDevice, id 0x100000218, registered, matched, active, busy 0 (7 ms), retain 40>
    {
      "IOPolledInterface" = "AppleARMWatchdogTimerHibernateHandler is not serializable"
      "IOPlatformSerialNumber" = "C02XXXXXXX"
      "IOPlatformUUID" = "5A1C9B3E-0D2F-4E8A-9B7C-1D2E3F4A5B6C"
      "IOBusyInterest" = "IOCommand is not serializable"
    }
"#;

#[test]
fn ioreg_uuid_is_extracted() {
    assert_eq!(parse_ioreg_uuid(IOREG), Some("5A1C9B3E-0D2F-4E8A-9B7C-1D2E3F4A5B6C"));
}

#[yare::parameterized(
    empty = { "" },
    no_uuid_line = { "    \"IOPlatformSerialNumber\" = \"C02XXXXXXX\"\n" },
    blank_value = { "    \"IOPlatformUUID\" = \"\"\n" },
)]
fn ioreg_without_uuid(output: &str) {
    assert_eq!(parse_ioreg_uuid(output), None);
}

#[test]
fn fixed_identity_is_normalized() -> anyhow::Result<()> {
    let id = IdentitySource::Fixed("  4C4C4544-0042-4810-8056-B4C04F395931\n".to_owned()).identity()?;
    assert_eq!(id.as_str(), "4c4c4544-0042-4810-8056-b4c04f395931");
    Ok(())
}

#[test]
fn blank_fixed_identity_fails() {
    assert!(IdentitySource::Fixed("   ".to_owned()).identity().is_err());
}

#[test]
fn override_takes_precedence() {
    assert_eq!(IdentitySource::select(Some("abc")), IdentitySource::Fixed("abc".to_owned()));
    assert_eq!(IdentitySource::select(None), IdentitySource::for_host());
}

#[cfg(target_os = "linux")]
#[test]
fn linux_uses_dmi() {
    assert_eq!(IdentitySource::for_host(), IdentitySource::LinuxDmi);
}
