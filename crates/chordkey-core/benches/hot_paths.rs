use chordkey_core::config::TouchInput;
use chordkey_core::grid::{Dimensions, SpatialGrid};
use chordkey_core::layout::CommandTable;
use chordkey_core::{
    builtin_layout, parse_layout_content, ChordKeyboardEngine, ContactEvent, EngineConfig,
    KeyCoord, Phase, Point, Rect,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Instant;

const BENCH_LAYOUT: &str = r#"
; bench
[chords]
0,0,1 1,0,0 = char r
0,0,0 1,0,0 = char R
0,1,1 1,1,0 = char e

[singles]
0,2,0 = keycode 115 End
0,4,0 = mod 1 Alfa
"#;

fn make_engine(touch_input: TouchInput) -> ChordKeyboardEngine {
    let config = EngineConfig {
        touch_input,
        delay_sequence_begin: false,
        ..EngineConfig::default()
    };
    let mapping = builtin_layout().expect("failed to parse builtin layout");
    let mut engine = ChordKeyboardEngine::new(config, mapping);
    engine.resize(Rect::new(0.0, 0.0, 800.0, 100.0));
    engine
}

fn bench_find_key(c: &mut Criterion) {
    let mut grid = SpatialGrid::default();
    grid.calculate_layout(Rect::new(0.0, 0.0, 800.0, 100.0), &Dimensions::default());
    c.bench_function("grid/find_key", |b| {
        b.iter(|| {
            black_box(grid.find_key(black_box(Point::new(120.0, 60.0))));
            black_box(grid.find_key(black_box(Point::new(400.0, 50.0))));
        });
    });
}

fn bench_single_tap(c: &mut Criterion) {
    let mut engine = make_engine(TouchInput::Single);
    let p = engine.grid().key_center(KeyCoord::left(2, 0));
    let t = Instant::now();
    c.bench_function("engine/single_tap", |b| {
        b.iter(|| {
            black_box(engine.on_event(ContactEvent::touch(1, Phase::Begin, p, 10, t)));
            black_box(engine.on_event(ContactEvent::touch(1, Phase::End, p, 20, t)));
        });
    });
}

fn bench_pair_chord(c: &mut Criterion) {
    let mut engine = make_engine(TouchInput::Multi);
    let a = engine.grid().key_center(KeyCoord::left(0, 1));
    let r = engine.grid().key_center(KeyCoord::right(0, 0));
    let t = Instant::now();
    c.bench_function("engine/pair_chord", |b| {
        b.iter(|| {
            engine.on_event(ContactEvent::touch(1, Phase::Begin, a, 10, t));
            engine.on_event(ContactEvent::touch(2, Phase::Begin, r, 12, t));
            engine.on_event(ContactEvent::touch(1, Phase::Update, a, 15, t));
            engine.on_event(ContactEvent::touch(1, Phase::End, a, 20, t));
            black_box(engine.on_event(ContactEvent::touch(2, Phase::End, r, 22, t)));
        });
    });
}

fn bench_parse_layout(c: &mut Criterion) {
    let dims = Dimensions::default();
    let commands = CommandTable::new();
    c.bench_function("layout/parse_small", |b| {
        b.iter(|| black_box(parse_layout_content(black_box(BENCH_LAYOUT), &dims, &commands)));
    });
    c.bench_function("layout/parse_builtin", |b| {
        b.iter(|| black_box(builtin_layout()));
    });
}

criterion_group!(
    benches,
    bench_find_key,
    bench_single_tap,
    bench_pair_chord,
    bench_parse_layout
);
criterion_main!(benches);
