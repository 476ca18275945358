// convert.rs — `tg convert`: dates and durations as ticks.

use clap::Args;
use serde_json::json;
use tg_clock::{format_duration, Tick};
use tg_graph::Graph;

#[derive(Args)]
pub struct ConvertArgs {
    /// Calendar date (RFC 3339 or "YYYY-MM-DD HH:MM:SS").
    #[arg(long, conflicts_with = "duration", required_unless_present = "duration")]
    pub date: Option<String>,

    /// Duration ("HH:MM:SS[.f]" or seconds).
    #[arg(long)]
    pub duration: Option<String>,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Tick bounds of a converted value, with the calendar text of each bound.
#[derive(Debug, PartialEq)]
struct Conversion {
    floor: Tick,
    ceil: Tick,
    floor_text: String,
    ceil_text: String,
}

pub fn execute(args: &ConvertArgs, graph: &Graph) -> anyhow::Result<()> {
    let conversion = match (&args.date, &args.duration) {
        (Some(date), _) => convert_date(graph, date)?,
        (None, Some(duration)) => convert_duration(graph, duration)?,
        (None, None) => anyhow::bail!("either --date or --duration is required"),
    };

    if args.json {
        let value = json!({
            "tick_duration": format_duration(graph.tick_duration()),
            "floor": conversion.floor,
            "ceil": conversion.ceil,
            "floor_text": conversion.floor_text,
            "ceil_text": conversion.ceil_text,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else if conversion.floor == conversion.ceil {
        println!("{}  ({})", conversion.floor, conversion.floor_text);
    } else {
        println!(
            "[{}, {}]  ({} .. {})",
            conversion.floor, conversion.ceil, conversion.floor_text, conversion.ceil_text
        );
    }
    Ok(())
}

fn convert_date(graph: &Graph, text: &str) -> anyhow::Result<Conversion> {
    let floor = graph.as_date(text)?;
    let date = tg_clock::parse_date(text)?;
    let ceil = graph
        .clock()
        .time_to_tick(date, tg_clock::Rounding::Ceil)?;
    Ok(Conversion {
        floor,
        ceil,
        floor_text: graph.date_str(floor)?,
        ceil_text: graph.date_str(ceil)?,
    })
}

fn convert_duration(graph: &Graph, text: &str) -> anyhow::Result<Conversion> {
    let floor = graph.as_duration(text, false)?;
    let ceil = graph.as_duration(text, true)?;
    Ok(Conversion {
        floor,
        ceil,
        floor_text: graph.duration_str(floor)?,
        ceil_text: graph.duration_str(ceil)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_graph::GraphConfig;

    fn half_second_graph() -> Graph {
        let config = GraphConfig {
            tick_duration: "00:00:00.5".to_string(),
            epoch: Some("2024-03-01T12:00:00Z".to_string()),
            ..GraphConfig::default()
        };
        Graph::from_config(&config).unwrap()
    }

    #[test]
    fn date_between_ticks_has_two_bounds() {
        let conversion = convert_date(&half_second_graph(), "2024-03-01T12:00:01.2Z").unwrap();
        assert_eq!(conversion.floor, 2);
        assert_eq!(conversion.ceil, 3);
        assert_eq!(conversion.floor_text, "2024-03-01T12:00:01Z");
        assert_eq!(conversion.ceil_text, "2024-03-01T12:00:01.500Z");
    }

    #[test]
    fn exact_duration_is_a_single_tick_count() {
        let conversion = convert_duration(&half_second_graph(), "00:01:00").unwrap();
        assert_eq!(
            conversion,
            Conversion {
                floor: 120,
                ceil: 120,
                floor_text: "00:01:00".to_string(),
                ceil_text: "00:01:00".to_string(),
            }
        );
    }

    #[test]
    fn plain_seconds_round_outward() {
        let conversion = convert_duration(&half_second_graph(), "1.2").unwrap();
        assert_eq!((conversion.floor, conversion.ceil), (2, 3));
        assert_eq!(conversion.ceil_text, "00:00:01.5");
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(convert_date(&half_second_graph(), "yesterday").is_err());
        assert!(convert_duration(&half_second_graph(), "a while").is_err());
    }
}
