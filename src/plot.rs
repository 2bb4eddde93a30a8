use camino::Utf8Path;
use plotters::prelude::*;

use crate::error::GrabError;
use crate::wfdb::WfdbRecord;

const PLOT_SIZE: (u32, u32) = (1280, 720);
const SERIES_COLOR: RGBColor = RGBColor(200, 0, 100);

/// Renders one channel of a record as a line plot against its time
/// axis, written as a PNG. NaN samples (invalid-sample sentinels) are
/// dropped from the series.
pub fn render_channel(
    record: &WfdbRecord,
    channel: usize,
    out_path: &Utf8Path,
) -> Result<(), GrabError> {
    let values = record.channel(channel);
    let time = record.time_axis();
    let name = record.channel_names()[channel].to_string();
    let units = record.units(channel).to_string();

    let (y_min, y_max) = value_bounds(values).ok_or_else(|| {
        GrabError::Plot(format!("channel {name} has no finite samples to plot"))
    })?;
    let x_max = record.sample_count() as f64 / record.sampling_frequency();

    let root = BitMapBackend::new(out_path.as_std_path(), PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(25)
        .caption(format!("{}: {name}", record.name()), ("sans-serif", 24))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(0f64..x_max, y_min..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc(format!("{name} ({units})"))
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            time.iter()
                .copied()
                .zip(values.iter().copied())
                .filter(|(_, value)| value.is_finite()),
            &SERIES_COLOR,
        ))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

fn plot_err<E: std::fmt::Display>(err: E) -> GrabError {
    GrabError::Plot(err.to_string())
}

/// Y range over the finite samples, padded so the trace does not sit on
/// the plot border. None when no sample is finite.
fn value_bounds(values: &[f64]) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &value in values {
        if value.is_finite() {
            min = min.min(value);
            max = max.max(value);
        }
    }
    if min > max {
        return None;
    }
    if min == max {
        return Some((min - 1.0, max + 1.0));
    }
    let pad = (max - min) * 0.05;
    Some((min - pad, max + pad))
}
