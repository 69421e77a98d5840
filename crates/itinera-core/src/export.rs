use std::fmt::Write;

use crate::store::ItineraryStore;

pub const EXPORT_FILE_NAME: &str = "itinerary.txt";

/// Plain-text day plan: one section per itinerary stop and a "Move to"
/// section between consecutive stops.
pub fn render_itinerary_text(store: &ItineraryStore, title: Option<&str>) -> String {
    let mut out = String::new();
    let heading = match title.map(str::trim).filter(|title| !title.is_empty()) {
        Some(title) => format!("Day itinerary: {title}"),
        None => "Day itinerary".to_string(),
    };
    let _ = writeln!(out, "{heading}");
    let _ = writeln!(out, "{}", "=".repeat(heading.chars().count()));

    let stops: Vec<_> = store.itinerary().collect();
    for (idx, stop) in stops.iter().enumerate() {
        if idx > 0 {
            let _ = writeln!(out, "Move to {}", stop.name);
            if let Some(conn) = store.find_connection_between(stops[idx - 1], stop) {
                if let Some(transport) = conn.transport.as_deref() {
                    let _ = writeln!(out, "  Transport: {transport}");
                }
                if let Some(travel_time) = conn.travel_time.as_deref() {
                    let _ = writeln!(out, "  Travel time: {travel_time}");
                }
            }
            out.push('\n');
        }

        let _ = writeln!(out, "{}. {}", idx + 1, stop.name);
        if let Some(time) = stop.time.as_deref() {
            let _ = writeln!(out, "  Time: {time}");
        }
        if let Some(duration) = stop.duration.as_deref() {
            let _ = writeln!(out, "  Duration: {duration}");
        }
        if !stop.description.is_empty() {
            let _ = writeln!(out, "  {}", stop.description);
        }
        out.push('\n');
    }

    out
}
