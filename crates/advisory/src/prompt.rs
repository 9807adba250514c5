//! Deterministic advisory prompt.

use common::{Coordinates, HealthCondition, PollutantReading};

/// Conditions beyond this many are left out of the prompt.
pub const MAX_PROMPT_CONDITIONS: usize = 8;

const NOT_AVAILABLE: &str = "n/a";

fn or_na(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn render_condition(condition: &HealthCondition) -> String {
    let mut out = condition.name.clone();
    if let Some(severity) = condition.severity {
        out.push('(');
        out.push_str(severity.as_str());
        out.push(')');
    }
    let notes = condition.notes.as_deref().unwrap_or_default();
    if !notes.is_empty() {
        out.push_str(" - ");
        out.push_str(notes);
    }
    out
}

/// `name(severity) - notes` for the first eight conditions, joined by `"; "`.
pub fn conditions_summary(conditions: &[HealthCondition]) -> String {
    if conditions.is_empty() {
        return "none reported".to_string();
    }
    conditions
        .iter()
        .take(MAX_PROMPT_CONDITIONS)
        .map(render_condition)
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn build_prompt(
    coordinates: Coordinates,
    reading: &PollutantReading,
    conditions: &[HealthCondition],
) -> String {
    format!(
        r#"You are a concise respiratory-health advisor.
Given local air metrics, assess outdoor safety and health risks for a general adult.

Respond ONLY with a single compact JSON object with exactly these fields and no surrounding prose:
{{
  "safe_to_go_out": boolean,
  "risk_summary": string,
  "recommendations": string[]
}}

Rules:
- Be specific to the given AQI and pollutants.
- If unsafe, quantify risk and short-term symptoms likely; if safe, provide brief caveats.
- Recommendations must be actionable (mask type, activity duration, indoor alternatives, timing/day suggestions).
- Keep strings short (<220 chars each). No markdown.

Inputs:
- Location: lat {lat:.4}, lon {lon:.4}
- AQI: {aqi}
- PM2.5: {pm25}
- PM10: {pm10}
- O3: {o3}
- NO2: {no2}
- SO2: {so2}
- CO: {co}
- User health conditions (consider risks/recs tailored to these): {conditions}"#,
        lat = coordinates.lat,
        lon = coordinates.lon,
        aqi = reading.aqi,
        pm25 = or_na(reading.pm25),
        pm10 = or_na(reading.pm10),
        o3 = or_na(reading.o3),
        no2 = or_na(reading.no2),
        so2 = or_na(reading.so2),
        co = or_na(reading.co),
        conditions = conditions_summary(conditions),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Severity;

    fn reading() -> PollutantReading {
        PollutantReading {
            aqi: 87,
            pm25: Some(28.5),
            pm10: Some(40.0),
            o3: None,
            no2: None,
            so2: None,
            co: None,
            observed_at: None,
        }
    }

    fn condition(name: &str, severity: Option<Severity>, notes: Option<&str>) -> HealthCondition {
        HealthCondition {
            name: name.to_string(),
            severity,
            notes: notes.map(str::to_string),
        }
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let coords = Coordinates::new(40.712_776, -74.005_974);
        let asthma = condition("asthma", Some(Severity::High), Some("uses inhaler"));
        let conditions = vec![asthma];

        let first = build_prompt(coords, &reading(), &conditions);
        let second = build_prompt(coords, &reading(), &conditions);
        assert_eq!(first, second);
    }

    #[test]
    fn test_prompt_renders_inputs() {
        let coords = Coordinates::new(40.712_776, -74.005_974);
        let prompt = build_prompt(coords, &reading(), &[]);

        assert!(prompt.contains("- Location: lat 40.7128, lon -74.0060"));
        assert!(prompt.contains("- AQI: 87"));
        assert!(prompt.contains("- PM2.5: 28.5"));
        assert!(prompt.contains("- PM10: 40\n"));
        assert!(prompt.contains("- O3: n/a"));
        assert!(prompt.contains("- CO: n/a"));
        assert!(prompt.ends_with("tailored to these): none reported"));
        assert!(prompt.contains("\"safe_to_go_out\": boolean"));
    }

    #[test]
    fn test_condition_segments_are_optional() {
        let summary = conditions_summary(&[
            condition("asthma", Some(Severity::High), Some("uses inhaler")),
            condition("copd", None, None),
            condition("allergy", Some(Severity::Low), Some("")),
            condition("bronchitis", None, Some("recovering")),
        ]);
        assert_eq!(
            summary,
            "asthma(high) - uses inhaler; copd; allergy(low); bronchitis - recovering"
        );
    }

    #[test]
    fn test_only_first_eight_conditions_are_included() {
        let conditions: Vec<_> = (1..=10)
            .map(|i| condition(&format!("cond{i}"), Some(Severity::Medium), None))
            .collect();

        let summary = conditions_summary(&conditions);
        let parts: Vec<&str> = summary.split("; ").collect();
        assert_eq!(parts.len(), 8);
        assert_eq!(parts[0], "cond1(medium)");
        assert_eq!(parts[7], "cond8(medium)");
        assert!(!summary.contains("cond9"));
        assert!(!summary.contains("cond10"));
    }
}
