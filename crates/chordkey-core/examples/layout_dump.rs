use chordkey_core::chord::Chord;
use chordkey_core::grid::Dimensions;
use chordkey_core::layout::{load_layout, CommandTable};
use chordkey_core::{builtin_layout, Action, ChordMapping, Command};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mapping: ChordMapping = match std::env::args().nth(1) {
        Some(path) => {
            println!("Loading {:?}", path);
            let mut commands = CommandTable::new();
            commands.insert(
                "hello".to_string(),
                Command::new("hello", || {
                    println!("hello from a layout command");
                    true
                }),
            );
            load_layout(&path, &Dimensions::default(), &commands)?
        }
        None => {
            println!("No path given, dumping the builtin layout.");
            builtin_layout()?
        }
    };

    println!(
        "Layout {:?}: {} entries",
        mapping.name().unwrap_or("(unnamed)"),
        mapping.len()
    );

    let mut rows: Vec<(String, String)> = mapping
        .iter()
        .filter_map(|(chord, action)| {
            let keys = match chord {
                Chord::Single(k) => k.to_string(),
                // Pairs are stored in both orders; print each once.
                Chord::Pair(a, b) if a <= b => format!("{} {}", a, b),
                Chord::Pair(..) => return None,
            };
            let kind = match action.as_ref() {
                Action::Generic { .. } => "command",
                Action::Type(_) => "type",
                Action::Modifier(_) => "modifier",
            };
            Some((keys, format!("{:<8} {}", kind, action.label())))
        })
        .collect();
    rows.sort();

    for (keys, action) in rows {
        println!("  {:<20} {}", keys, action);
    }

    Ok(())
}
