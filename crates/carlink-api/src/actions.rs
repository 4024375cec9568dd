//! Remote action request bodies.
//!
//! Each builder returns an [`ActionRequest`]: the endpoint template, service
//! and action ids, whether a security token is needed and the encoded body.

use carlink_config::ClimateBodyFormat;

pub const SERVICE_LOCK_UNLOCK: &str = "rlu_v1";
pub const SERVICE_CLIMATISATION: &str = "rclima_v1";
pub const SERVICE_HEATING: &str = "rheating_v1";
pub const SERVICE_BATTERY_CHARGE: &str = "rbatterycharge_v1";
pub const SERVICE_HONK_FLASH: &str = "rhonk_v1";
pub use crate::request::SERVICE_STATUS_REPORT;

pub const ACTION_LOCK: &str = "LOCK";
pub const ACTION_UNLOCK: &str = "UNLOCK";
pub const ACTION_CLIMA_START_ELECTRIC: &str = "P_START_CLIMA_EL";
pub const ACTION_CLIMA_START_AUX: &str = "P_START_CLIMA_AU";
pub const ACTION_QUICK_STOP: &str = "P_QSTOP";
pub const ACTION_HEATING_QUICK_START: &str = "P_QSACT";
pub const ACTION_HEATING_QUICK_STOP: &str = "P_QSTOPACT";
pub const ACTION_SET_SETTINGS: &str = "setSettings";
pub const ACTION_SET_MAX_CHARGE: &str = "setMaxCharge";
pub const ACTION_SET_TARGET_SOC: &str = "setTargetSoc";
pub const ACTION_HONK_FLASH: &str = "HONK_AND_FLASH";
pub const ACTION_FLASH_ONLY: &str = "FLASH_ONLY";
pub const ACTION_STATUS: &str = "status";

/// Heater source that runs on the traction battery.
pub const HEATER_SOURCE_ELECTRIC: &str = "electric";

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>"#;

const CT_RLU: &str = "application/vnd.vwg.mbb.RemoteLockUnlock_v1_0_0+xml";
const CT_CLIMATER_XML: &str = "application/vnd.vwg.mbb.ClimaterAction_v1_0_0+xml;charset=utf-8";
const CT_CLIMATER_JSON: &str = "application/vnd.vwg.mbb.ClimaterAction_v1_0_2+json";
const CT_CHARGER: &str = "application/vnd.vwg.mbb.ChargerAction_v1_0_0+xml";
const CT_WINDOW_HEATING: &str = "application/vnd.vwg.mbb.ClimaterAction_v1_0_0+xml";
const CT_JSON_UTF8: &str = "application/json; charset=UTF-8";
const CT_HEATER_XML: &str = "application/vnd.vwg.mbb.RemoteStandheizung_v2_0_0+xml";
const CT_HEATER_JSON: &str = "application/vnd.vwg.mbb.RemoteStandheizung_v2_0_2+json";

/// JSON ventilation requests go to the generic action endpoint.
const VENTILATION_JSON_URI: &str = "bs/rs/v1/{0}/{1}/vehicles/{2}/action";

/// Default endpoint templates, used when the brand profile has none.
pub fn default_uri(service: &str) -> &'static str {
    match service {
        SERVICE_LOCK_UNLOCK => "bs/rlu/v1/{0}/{1}/vehicles/{2}/actions",
        SERVICE_CLIMATISATION => "bs/climatisation/v1/{0}/{1}/vehicles/{2}/climater/actions",
        SERVICE_HEATING => "bs/rs/v1/{0}/{1}/vehicles/{2}/climater/actions",
        SERVICE_BATTERY_CHARGE => "bs/batterycharge/v1/{0}/{1}/vehicles/{2}/charger/actions",
        SERVICE_HONK_FLASH => "bs/rhf/v1/{0}/{1}/vehicles/{2}/honkAndFlash",
        SERVICE_STATUS_REPORT => "bs/vsr/v1/{0}/{1}/vehicles/{2}/requests",
        _ => "",
    }
}

/// Encoded remote action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub service: &'static str,
    /// Endpoint template replacing the service's usual one.
    pub endpoint: Option<&'static str>,
    pub action: String,
    pub requires_pin: bool,
    pub content_type: &'static str,
    pub body: String,
}

/// Lock or unlock the doors.
pub fn lock(lock: bool) -> ActionRequest {
    let action = if lock { ACTION_LOCK } else { ACTION_UNLOCK };
    ActionRequest {
        service: SERVICE_LOCK_UNLOCK,
        endpoint: None,
        action: action.to_string(),
        requires_pin: true,
        content_type: CT_RLU,
        body: format!(
            r#"{}<rluAction xmlns="http://audi.de/connect/rlu"><action>{}</action></rluAction>"#,
            XML_HEADER,
            action.to_ascii_lowercase()
        ),
    }
}

/// Start or stop climatisation.
///
/// Auxiliary heating needs the security PIN; electric climatisation does not.
pub fn climater(format: ClimateBodyFormat, start: bool, heater_source: &str) -> ActionRequest {
    let electric = heater_source.eq_ignore_ascii_case(HEATER_SOURCE_ELECTRIC);
    let requires_pin = !electric;

    if !start {
        return ActionRequest {
            service: SERVICE_CLIMATISATION,
            endpoint: None,
            action: ACTION_QUICK_STOP.to_string(),
            requires_pin,
            content_type: CT_CLIMATER_XML,
            body: "<action><type>stopClimatisation</type></action>".to_string(),
        };
    }

    let action = if electric {
        ACTION_CLIMA_START_ELECTRIC
    } else {
        ACTION_CLIMA_START_AUX
    };
    let (content_type, body) = match format {
        _ if heater_source.is_empty() => (CT_CLIMATER_XML, start_climatisation_xml()),
        ClimateBodyFormat::XmlV1 => (CT_CLIMATER_XML, start_climatisation_xml()),
        ClimateBodyFormat::XmlV2 => (
            CT_CLIMATER_XML,
            format!(
                "{}<action><type>startClimatisation</type><settings><heaterSource>{}</heaterSource></settings></action>",
                XML_HEADER, heater_source
            ),
        ),
        ClimateBodyFormat::Json => (
            CT_CLIMATER_JSON,
            serde_json::json!({
                "action": {
                    "settings": {
                        "climatisationWithoutHVpower": "without_hv_power",
                        "heaterSource": heater_source,
                    },
                    "type": "startClimatisation",
                }
            })
            .to_string(),
        ),
    };

    ActionRequest {
        service: SERVICE_CLIMATISATION,
        endpoint: None,
        action: action.to_string(),
        requires_pin,
        content_type,
        body,
    }
}

fn start_climatisation_xml() -> String {
    format!("{}<action><type>startClimatisation</type></action>", XML_HEADER)
}

/// Start or stop charging.
pub fn charger(start: bool) -> ActionRequest {
    let action = if start { "start" } else { "stop" };
    ActionRequest {
        service: SERVICE_BATTERY_CHARGE,
        endpoint: None,
        action: action.to_string(),
        requires_pin: false,
        content_type: CT_CHARGER,
        body: format!("{}<action><type>{}</type></action>", XML_HEADER, action),
    }
}

/// Target temperature and heater source for the next climatisation.
pub fn climater_temp(temp_celsius: f64, heater_source: &str) -> ActionRequest {
    ActionRequest {
        service: SERVICE_CLIMATISATION,
        endpoint: None,
        action: ACTION_SET_SETTINGS.to_string(),
        requires_pin: false,
        content_type: CT_CLIMATER_XML,
        body: format!(
            "{}<action><type>setSettings</type><settings><targetTemperature>{}</targetTemperature>\
             <climatisationWithoutHVpower>false</climatisationWithoutHVpower>\
             <heaterSource>{}</heaterSource></settings></action>",
            XML_HEADER,
            deci_kelvin(temp_celsius),
            heater_source
        ),
    }
}

/// Celsius to tenths of a Kelvin, the unit the climater settings use.
/// The zero point is rounded to 2732 so half degrees map exactly.
fn deci_kelvin(celsius: f64) -> i64 {
    (celsius * 10.0).round() as i64 + 2732
}

/// Start or stop the auxiliary heater.
///
/// Always needs the security PIN. `duration_mins` is only sent in the JSON
/// layout.
pub fn pre_heating(format: ClimateBodyFormat, start: bool, duration_mins: u32) -> ActionRequest {
    let (content_type, body) = match format {
        ClimateBodyFormat::Json => (CT_HEATER_JSON, heater_json(start, "heating", duration_mins)),
        ClimateBodyFormat::XmlV1 | ClimateBodyFormat::XmlV2 => (
            CT_HEATER_XML,
            format!(
                r#"{}<performAction xmlns="http://audi.de/connect/rs"><quickstart><active>{}</active></quickstart></performAction>"#,
                XML_HEADER, start
            ),
        ),
    };
    heater_request(start, None, content_type, body)
}

/// Start or stop ventilation through the auxiliary heater.
pub fn ventilation(format: ClimateBodyFormat, start: bool, duration_mins: u32) -> ActionRequest {
    match format {
        ClimateBodyFormat::Json => heater_request(
            start,
            Some(VENTILATION_JSON_URI),
            CT_HEATER_JSON,
            heater_json(start, "ventilation", duration_mins),
        ),
        ClimateBodyFormat::XmlV1 | ClimateBodyFormat::XmlV2 => {
            let inner = if start {
                format!(
                    "<quickstart><active>true</active><climatisationDuration>{}</climatisationDuration>\
                     <startMode>ventilation</startMode></quickstart>",
                    duration_mins
                )
            } else {
                "<quickstop><active>false</active></quickstop>".to_string()
            };
            heater_request(
                start,
                None,
                CT_HEATER_XML,
                format!(
                    r#"{}<performAction xmlns="http://audi.de/connect/rs">{}</performAction>"#,
                    XML_HEADER, inner
                ),
            )
        }
    }
}

fn heater_json(start: bool, mode: &str, duration_mins: u32) -> String {
    let body = if start {
        serde_json::json!({
            "performAction": {
                "quickstart": {
                    "startMode": mode,
                    "active": true,
                    "climatisationDuration": duration_mins,
                }
            }
        })
    } else {
        serde_json::json!({ "performAction": { "quickstop": { "active": false } } })
    };
    body.to_string()
}

fn heater_request(
    start: bool,
    endpoint: Option<&'static str>,
    content_type: &'static str,
    body: String,
) -> ActionRequest {
    let action = if start {
        ACTION_HEATING_QUICK_START
    } else {
        ACTION_HEATING_QUICK_STOP
    };
    ActionRequest {
        service: SERVICE_HEATING,
        endpoint,
        action: action.to_string(),
        requires_pin: true,
        content_type,
        body,
    }
}

/// Limit the charging current, in amperes.
pub fn max_charge(max_current: u32) -> ActionRequest {
    ActionRequest {
        service: SERVICE_BATTERY_CHARGE,
        endpoint: None,
        action: ACTION_SET_MAX_CHARGE.to_string(),
        requires_pin: false,
        content_type: CT_CHARGER,
        body: format!(
            "{}<action><type>setSettings</type><settings><maxChargeCurrent>{}</maxChargeCurrent></settings></action>",
            XML_HEADER, max_current
        ),
    }
}

/// Start or stop window heating.
pub fn window_heating(start: bool) -> ActionRequest {
    let action = if start {
        "startWindowHeating"
    } else {
        "stopWindowHeating"
    };
    ActionRequest {
        service: SERVICE_CLIMATISATION,
        endpoint: None,
        action: action.to_string(),
        requires_pin: false,
        content_type: CT_WINDOW_HEATING,
        body: format!("{}<action><type>{}</type></action>", XML_HEADER, action),
    }
}

/// Honk and flash, or flash only, at the user's position.
pub fn honk_flash(honk: bool, latitude: f64, longitude: f64, duration_secs: u32) -> ActionRequest {
    let action = if honk {
        ACTION_HONK_FLASH
    } else {
        ACTION_FLASH_ONLY
    };
    ActionRequest {
        service: SERVICE_HONK_FLASH,
        endpoint: None,
        action: action.to_string(),
        requires_pin: false,
        content_type: CT_JSON_UTF8,
        body: format!(
            r#"{{"honkAndFlashRequest":{{"serviceOperationCode":"{}","serviceDuration":{},"userPosition":{{"latitude":{},"longitude":{}}}}}}}"#,
            action,
            duration_secs,
            micro_degrees(latitude),
            micro_degrees(longitude)
        ),
    }
}

/// Coordinate in millionths of a degree, zero padded to eight digits.
fn micro_degrees(degrees: f64) -> String {
    format!("{:08}", (degrees * 1_000_000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_body() {
        let r = lock(true);
        assert_eq!(r.action, "LOCK");
        assert!(r.requires_pin);
        assert!(r.body.ends_with("<action>lock</action></rluAction>"));
        assert_eq!(lock(false).action, "UNLOCK");
    }

    #[test]
    fn test_climater_json() {
        let r = climater(ClimateBodyFormat::Json, true, "auxiliary");
        assert_eq!(r.action, ACTION_CLIMA_START_AUX);
        assert!(r.requires_pin);
        assert_eq!(r.content_type, CT_CLIMATER_JSON);
        assert_eq!(
            r.body,
            r#"{"action":{"settings":{"climatisationWithoutHVpower":"without_hv_power","heaterSource":"auxiliary"},"type":"startClimatisation"}}"#
        );
    }

    #[test]
    fn test_climater_electric_needs_no_pin() {
        let r = climater(ClimateBodyFormat::Json, true, "electric");
        assert_eq!(r.action, ACTION_CLIMA_START_ELECTRIC);
        assert!(!r.requires_pin);
    }

    #[test]
    fn test_climater_xml_variants() {
        let v1 = climater(ClimateBodyFormat::XmlV1, true, "electric");
        assert!(v1.body.ends_with("<action><type>startClimatisation</type></action>"));
        assert_eq!(v1.content_type, CT_CLIMATER_XML);

        let v2 = climater(ClimateBodyFormat::XmlV2, true, "auxiliary");
        assert!(v2.body.contains("<heaterSource>auxiliary</heaterSource>"));

        // No heater source falls back to the minimal body
        let json = climater(ClimateBodyFormat::Json, true, "");
        assert_eq!(json.content_type, CT_CLIMATER_XML);
    }

    #[test]
    fn test_climater_stop() {
        let r = climater(ClimateBodyFormat::Json, false, "electric");
        assert_eq!(r.action, ACTION_QUICK_STOP);
        assert_eq!(r.body, "<action><type>stopClimatisation</type></action>");
    }

    #[test]
    fn test_honk_flash_body() {
        let r = honk_flash(false, 48.5, 9.25, 15);
        assert_eq!(r.action, "FLASH_ONLY");
        assert_eq!(
            r.body,
            r#"{"honkAndFlashRequest":{"serviceOperationCode":"FLASH_ONLY","serviceDuration":15,"userPosition":{"latitude":48500000,"longitude":09250000}}}"#
        );
    }

    #[test]
    fn test_charger_and_window_heating() {
        assert!(charger(true).body.contains("<type>start</type>"));
        assert_eq!(charger(false).service, SERVICE_BATTERY_CHARGE);
        assert_eq!(window_heating(true).action, "startWindowHeating");
        assert!(!window_heating(false).requires_pin);
    }

    #[test]
    fn test_climater_temp_in_deci_kelvin() {
        let r = climater_temp(21.5, "electric");
        assert_eq!(r.action, ACTION_SET_SETTINGS);
        assert!(!r.requires_pin);
        assert!(r.body.contains("<targetTemperature>2947</targetTemperature>"));
        assert!(r.body.contains("<climatisationWithoutHVpower>false</climatisationWithoutHVpower><heaterSource>electric</heaterSource>"));
        assert_eq!(deci_kelvin(0.0), 2732);
    }

    #[test]
    fn test_pre_heating_bodies() {
        let json = pre_heating(ClimateBodyFormat::Json, true, 30);
        assert_eq!(json.service, SERVICE_HEATING);
        assert_eq!(json.action, ACTION_HEATING_QUICK_START);
        assert!(json.requires_pin);
        assert_eq!(json.content_type, CT_HEATER_JSON);
        let body: serde_json::Value = serde_json::from_str(&json.body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"performAction": {"quickstart": {
                "startMode": "heating", "active": true, "climatisationDuration": 30
            }}})
        );
        assert_eq!(json.endpoint, None);

        let stop = pre_heating(ClimateBodyFormat::Json, false, 30);
        assert_eq!(stop.action, ACTION_HEATING_QUICK_STOP);
        assert_eq!(stop.body, r#"{"performAction":{"quickstop":{"active":false}}}"#);

        let xml = pre_heating(ClimateBodyFormat::XmlV2, false, 30);
        assert_eq!(xml.content_type, CT_HEATER_XML);
        assert!(xml.body.ends_with(
            r#"<performAction xmlns="http://audi.de/connect/rs"><quickstart><active>false</active></quickstart></performAction>"#
        ));
    }

    #[test]
    fn test_ventilation_bodies() {
        let json = ventilation(ClimateBodyFormat::Json, true, 10);
        assert_eq!(json.endpoint, Some(VENTILATION_JSON_URI));
        assert!(json.body.contains(r#""startMode":"ventilation""#));

        let xml = ventilation(ClimateBodyFormat::XmlV1, true, 10);
        assert_eq!(xml.endpoint, None);
        assert!(xml.body.contains(
            "<climatisationDuration>10</climatisationDuration><startMode>ventilation</startMode>"
        ));
        let xml_stop = ventilation(ClimateBodyFormat::XmlV1, false, 10);
        assert!(xml_stop.body.contains("<quickstop><active>false</active></quickstop>"));
    }

    #[test]
    fn test_max_charge_body() {
        let r = max_charge(16);
        assert_eq!(r.service, SERVICE_BATTERY_CHARGE);
        assert_eq!(r.action, "setMaxCharge");
        assert!(!r.requires_pin);
        assert!(r.body.contains("<maxChargeCurrent>16</maxChargeCurrent>"));
    }

    #[test]
    fn test_default_uri() {
        assert!(default_uri(SERVICE_LOCK_UNLOCK).starts_with("bs/rlu/v1"));
        assert_eq!(default_uri("unknown"), "");
    }
}
