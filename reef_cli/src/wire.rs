//! JSON wire format for the inbound command feed.
//!
//! One JSON object per line, tagged by `cmd`, matching the field names the
//! remote channel uses. Unknown commands and malformed lines are reported
//! and skipped; the feed itself never stops the controller.

use eyre::{Result, bail};
use reef_core::{Command, DoseScheduleCfg};
use reef_traits::Pump;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
enum WireCommand {
    ResetAi,
    Test {
        ca: f32,
        alk: f32,
        mg: f32,
        ph: f32,
        #[serde(default)]
        aux: Option<f32>,
    },
    LiveDose {
        pump: u8,
        ml: f32,
    },
    Calibrate {
        pump: u8,
        secs: f32,
    },
    #[serde(rename_all = "camelCase")]
    DoseSchedule {
        enabled: bool,
        start_hour: u8,
        end_hour: u8,
        every_min: u16,
    },
    TankSize {
        gallons: f32,
    },
    KillSwitch {
        on: bool,
    },
}

fn pump(n: u8) -> Result<Pump> {
    match Pump::from_number(n) {
        Some(p) => Ok(p),
        None => bail!("pump number must be 1..=4, got {n}"),
    }
}

/// Parse one line of the command feed.
pub fn parse_line(line: &str) -> Result<Command> {
    let wire: WireCommand = serde_json::from_str(line)?;
    Ok(match wire {
        WireCommand::ResetAi => Command::ResetAi,
        WireCommand::Test {
            ca,
            alk,
            mg,
            ph,
            aux,
        } => Command::SubmitTest {
            ca_ppm: ca,
            alk_dkh: alk,
            mg_ppm: mg,
            ph,
            aux,
        },
        WireCommand::LiveDose { pump: n, ml } => Command::LiveDose { pump: pump(n)?, ml },
        WireCommand::Calibrate { pump: n, secs } => Command::Calibrate {
            pump: pump(n)?,
            seconds: secs,
        },
        WireCommand::DoseSchedule {
            enabled,
            start_hour,
            end_hour,
            every_min,
        } => Command::SetSchedule(DoseScheduleCfg {
            enabled,
            start_hour,
            end_hour,
            every_minutes: every_min,
        }),
        WireCommand::TankSize { gallons } => Command::SetTankSize { gallons },
        WireCommand::KillSwitch { on } => Command::KillSwitch(on),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_documented_commands() {
        assert!(matches!(
            parse_line(r#"{"cmd":"resetAi"}"#).unwrap(),
            Command::ResetAi
        ));
        assert!(matches!(
            parse_line(r#"{"cmd":"test","ca":420,"alk":9.0,"mg":1440,"ph":8.2}"#).unwrap(),
            Command::SubmitTest { aux: None, .. }
        ));
        assert!(matches!(
            parse_line(r#"{"cmd":"liveDose","pump":2,"ml":10}"#).unwrap(),
            Command::LiveDose {
                pump: Pump::Afr,
                ..
            }
        ));
        assert!(matches!(
            parse_line(r#"{"cmd":"killSwitch","on":true}"#).unwrap(),
            Command::KillSwitch(true)
        ));
        let sched = parse_line(
            r#"{"cmd":"doseSchedule","enabled":true,"startHour":9,"endHour":17,"everyMin":60}"#,
        )
        .unwrap();
        assert!(matches!(
            sched,
            Command::SetSchedule(DoseScheduleCfg {
                enabled: true,
                start_hour: 9,
                end_hour: 17,
                every_minutes: 60,
            })
        ));
    }

    #[test]
    fn rejects_bad_pump_numbers_and_garbage() {
        assert!(parse_line(r#"{"cmd":"liveDose","pump":7,"ml":10}"#).is_err());
        assert!(parse_line(r#"{"cmd":"wat"}"#).is_err());
        assert!(parse_line("not json").is_err());
    }
}
