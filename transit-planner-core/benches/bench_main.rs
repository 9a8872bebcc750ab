use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use transit_planner_core::{
    GraphConfig, Route, Stop, StopTime, Timetable, Transfer, TransportMode, Trip, Weighting,
    build_graph, find_path,
};

const GRID: u32 = 40;

/// Square grid of stops served by one trip per row and per column, with
/// transfers along the diagonal
fn synthetic_timetable() -> Timetable {
    let id = |row: u32, col: u32| format!("{row}:{col}");
    let mut timetable = Timetable::default();

    for row in 0..GRID {
        for col in 0..GRID {
            timetable.stops.push(Stop {
                stop_id: id(row, col),
                name: format!("Stop {row}/{col}"),
                lat: 45.0 + f64::from(row) * 0.001,
                lon: 4.0 + f64::from(col) * 0.001,
            });
        }
    }

    for line in 0..GRID * 2 {
        let trip_id = format!("trip{line}");
        let route_id = format!("route{line}");
        let mode = if line < GRID { TransportMode::Tram } else { TransportMode::Bus };
        timetable.routes.push(Route {
            route_id: route_id.clone(),
            short_name: line.to_string(),
            long_name: String::new(),
            mode,
        });
        timetable.trips.push(Trip {
            trip_id: trip_id.clone(),
            route_id,
        });
        for seq in 0..GRID {
            let stop_id = if line < GRID { id(line, seq) } else { id(seq, line - GRID) };
            let time = 6 * 3600 + seq * 90;
            timetable.stop_times.push(StopTime {
                trip_id: trip_id.clone(),
                stop_id,
                sequence: seq,
                arrival: Some(time),
                departure: Some(time + 20),
            });
        }
    }

    for step in 0..GRID - 1 {
        timetable.transfers.push(Transfer {
            from_stop: id(step, step),
            to_stop: id(step + 1, step + 1),
            min_transfer_time: Some(240),
        });
    }
    timetable
}

fn bench_build(c: &mut Criterion) {
    let timetable = synthetic_timetable();
    let config = GraphConfig::default();
    c.bench_function("build_graph", |b| {
        b.iter(|| build_graph(black_box(&timetable), black_box(&config)));
    });
}

fn bench_find_path(c: &mut Criterion) {
    let graph = build_graph(&synthetic_timetable(), &GraphConfig::default());
    let weighting = Weighting::default();
    let end = format!("{}:{}", GRID - 1, GRID - 1);
    c.bench_function("find_path_corner_to_corner", |b| {
        b.iter(|| {
            find_path(
                black_box(&graph),
                "0:0",
                &end,
                |edge| weighting.edge_cost(edge),
                None,
            )
        });
    });
}

criterion_group!(benches, bench_build, bench_find_path);
criterion_main!(benches);
