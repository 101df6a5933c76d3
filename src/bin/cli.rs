use chrono::NaiveDate;
use programme_engine::{
    Actor, ConfiguredCalendarProvider, EngineConfig, EntryId, EntryPatch, HolidayCalendarType,
    MemoryAuditSink, MemoryEntryStore, OwnerId, OwnerSettings, ProgrammeEngine, ProgrammeEntry,
    ProgrammeSnapshot, Relationship, SplitPolicy, load_programme_from_csv,
    load_programme_from_json, programme_table, save_programme_to_csv, save_programme_to_json,
};
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Arc;

fn print_help() {
    println!(
        "Commands:\n  help                               Show this help\n  show                               Show the programme\n  settings                           Show owner settings\n  start <YYYY-MM-DD>                 Set base start date\n  holidays <federal|public|union|none>\n                                     Set the holiday calendar\n  factory <id|none>                  Set the factory work pattern\n  levels <buildings> <lowest> <highest> [cycle_days]\n                                     Set building and level range\n  generate                           Generate entries from settings\n  add <group_key> <cycle_days> [pred_seq] [FS|SS|FF|SF]\n                                     Append an entry\n  days  <seq> <n>                    Set cycle days\n  pred  <seq> <pred_seq|none> [rel]  Set or clear predecessor\n  mstart <seq> <YYYY-MM-DD|none>     Set manual start\n  mend   <seq> <YYYY-MM-DD|none>     Set manual end\n  notes <seq> <text...>              Set notes (rest of line)\n  split <seq> [parts|sizes_csv]      Split an entry (e.g. split 0 3,2)\n  move  <seq> <position>             Move an entry to a new position\n  delete <seq>                       Delete an entry and relink dependents\n  compute                            Recalculate dates\n  audit                              Show the change log\n  save <json|csv> <path>             Save settings and programme to disk\n  load <json|csv> <path>             Load settings and programme from disk\n  quit|exit                          Exit"
    );
}

fn show(engine: &ProgrammeEngine, owner: &OwnerId) {
    match engine.entries(owner) {
        Ok(entries) => print_entries(&entries),
        Err(e) => println!("Error: {}", e),
    }
}

fn print_entries(entries: &[ProgrammeEntry]) {
    match programme_table(entries) {
        Ok(table) => println!("{}", table),
        Err(e) => println!("Error rendering programme: {}", e),
    }
}

fn print_settings(settings: &OwnerSettings) {
    let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
    println!("Owner              : {}", settings.owner_id);
    println!("Base start date    : {}", date(settings.base_start_date));
    println!(
        "Holiday calendar   : {}",
        settings
            .holiday_calendar
            .map(|c| c.to_string())
            .unwrap_or_else(|| "none".into())
    );
    println!(
        "Factory            : {}",
        settings.factory_id.as_deref().unwrap_or("default")
    );
    println!("Buildings          : {}", settings.building_count);
    println!(
        "Levels             : {}..={}",
        settings.lowest_level, settings.highest_level
    );
    println!("Default cycle days : {}", settings.default_cycle_days);
}

fn entry_at(engine: &ProgrammeEngine, owner: &OwnerId, seq_s: &str) -> Result<EntryId, String> {
    let seq: i32 = seq_s.parse().map_err(|_| "Invalid sequence order".to_string())?;
    let entries = engine.entries(owner).map_err(|e| e.to_string())?;
    entries
        .iter()
        .find(|entry| entry.sequence_order == seq)
        .map(|entry| entry.id)
        .ok_or_else(|| format!("No entry at sequence order {seq}."))
}

fn parse_optional_date(input: &str) -> Result<Option<NaiveDate>, String> {
    if input.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| "Invalid date (YYYY-MM-DD)".to_string())
}

fn parse_split_policy(arg: Option<&str>) -> Result<SplitPolicy, String> {
    match arg {
        None => Ok(SplitPolicy::default()),
        Some(s) if s.contains(',') => s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map(|sizes| SplitPolicy::Sizes { sizes })
            .map_err(|_| "Invalid sizes (e.g. 3,2)".to_string()),
        Some(s) => s
            .parse::<u32>()
            .map(|parts| SplitPolicy::Even { parts })
            .map_err(|_| "Invalid number of parts".to_string()),
    }
}

fn update_settings(
    engine: &ProgrammeEngine,
    owner: &OwnerId,
    apply: impl FnOnce(&mut OwnerSettings),
) {
    match engine.owner_settings(owner) {
        Ok(mut settings) => {
            apply(&mut settings);
            match engine.save_settings(&settings) {
                Ok(_) => println!("Settings updated."),
                Err(e) => println!("Error: {}", e),
            }
        }
        Err(e) => println!("Error: {}", e),
    }
}

fn patch(engine: &ProgrammeEngine, owner: &OwnerId, actor: &Actor, seq_s: &str, patch: EntryPatch) {
    let id = match entry_at(engine, owner, seq_s) {
        Ok(id) => id,
        Err(msg) => {
            println!("{}", msg);
            return;
        }
    };
    match engine.patch(owner, id, &patch, actor) {
        Ok(entry) => {
            println!("Updated {}.", entry.display_name());
            show(engine, owner);
        }
        Err(e) => println!("Error: {}", e),
    }
}

fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("programme_engine=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Ignoring config: {}", e);
            EngineConfig::default()
        }
    };
    let audit = Arc::new(MemoryAuditSink::new());
    let engine = ProgrammeEngine::new(
        Arc::new(MemoryEntryStore::new()),
        Arc::new(ConfiguredCalendarProvider::new(&config)),
        audit.clone(),
        config,
    );
    let actor = Actor::new("cli", "CLI user");
    let mut owner = OwnerId::from("cli");
    if let Err(e) = engine.save_settings(&OwnerSettings::new(owner.clone())) {
        println!("Error: {}", e);
        return;
    }

    println!("Programme Engine (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "show" => show(&engine, &owner),
            "settings" => match engine.owner_settings(&owner) {
                Ok(settings) => print_settings(&settings),
                Err(e) => println!("Error: {}", e),
            },
            "start" => match parts.next().map(parse_optional_date) {
                Some(Ok(date)) => update_settings(&engine, &owner, |s| s.base_start_date = date),
                Some(Err(msg)) => println!("{}", msg),
                None => println!("Usage: start <YYYY-MM-DD>"),
            },
            "holidays" => match parts.next() {
                Some("none") => update_settings(&engine, &owner, |s| s.holiday_calendar = None),
                Some(name) => match HolidayCalendarType::from_str(name) {
                    Ok(calendar) => {
                        update_settings(&engine, &owner, |s| s.holiday_calendar = Some(calendar))
                    }
                    Err(e) => println!("{}", e),
                },
                None => println!("Usage: holidays <federal|public|union|none>"),
            },
            "factory" => match parts.next() {
                Some("none") => update_settings(&engine, &owner, |s| s.factory_id = None),
                Some(id) => {
                    let id = id.to_string();
                    update_settings(&engine, &owner, |s| s.factory_id = Some(id))
                }
                None => println!("Usage: factory <id|none>"),
            },
            "levels" => {
                let buildings = parts.next().and_then(|s| s.parse::<u32>().ok());
                let lowest = parts.next().and_then(|s| s.parse::<i32>().ok());
                let highest = parts.next().and_then(|s| s.parse::<i32>().ok());
                let cycle = parts.next().and_then(|s| s.parse::<u32>().ok());
                match (buildings, lowest, highest) {
                    (Some(buildings), Some(lowest), Some(highest)) => {
                        update_settings(&engine, &owner, |s| {
                            s.building_count = buildings;
                            s.lowest_level = lowest;
                            s.highest_level = highest;
                            if let Some(days) = cycle {
                                s.default_cycle_days = days;
                            }
                        })
                    }
                    _ => println!("Usage: levels <buildings> <lowest> <highest> [cycle_days]"),
                }
            }
            "generate" => match engine.generate_from_settings(&owner, &actor) {
                Ok(entries) => {
                    println!("Generated {} entries.", entries.len());
                    print_entries(&entries);
                }
                Err(e) => println!("Error: {}", e),
            },
            "add" => {
                let group = parts.next();
                let days = parts.next().map(|s| s.parse::<u32>());
                let pred = parts.next().map(|s| s.parse::<i32>());
                let rel = parts.next().map(Relationship::from_str);
                let (Some(group), Some(Ok(days))) = (group, days) else {
                    println!("Usage: add <group_key> <cycle_days> [pred_seq] [FS|SS|FF|SF]");
                    continue;
                };
                let pred = match pred.transpose() {
                    Ok(pred) => pred,
                    Err(_) => {
                        println!("Invalid predecessor");
                        continue;
                    }
                };
                let rel = match rel.transpose() {
                    Ok(rel) => rel,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                let mut entries = match engine.entries(&owner) {
                    Ok(entries) => entries,
                    Err(e) => {
                        println!("Error: {}", e);
                        continue;
                    }
                };
                let seq = entries.iter().map(|e| e.sequence_order + 1).max().unwrap_or(0);
                let mut entry = ProgrammeEntry::new(owner.clone(), group, seq, days);
                entry.set_predecessor(pred, rel);
                entries.push(entry);
                match engine.save_programme(&owner, entries, &actor) {
                    Ok(entries) => {
                        println!("Entry added at sequence order {seq}.");
                        print_entries(&entries);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "days" => match (parts.next(), parts.next().map(|s| s.parse::<u32>())) {
                (Some(seq_s), Some(Ok(days))) => patch(
                    &engine,
                    &owner,
                    &actor,
                    seq_s,
                    EntryPatch {
                        cycle_days: Some(days),
                        ..EntryPatch::default()
                    },
                ),
                _ => println!("Usage: days <seq> <n>"),
            },
            "pred" => {
                let seq_s = parts.next();
                let pred_s = parts.next();
                let rel = match parts.next().map(Relationship::from_str).transpose() {
                    Ok(rel) => rel,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                match (seq_s, pred_s) {
                    (Some(seq_s), Some("none")) => patch(
                        &engine,
                        &owner,
                        &actor,
                        seq_s,
                        EntryPatch {
                            predecessor_sequence_order: Some(None),
                            ..EntryPatch::default()
                        },
                    ),
                    (Some(seq_s), Some(pred_s)) => match pred_s.parse::<i32>() {
                        Ok(pred) => patch(
                            &engine,
                            &owner,
                            &actor,
                            seq_s,
                            EntryPatch {
                                predecessor_sequence_order: Some(Some(pred)),
                                relationship: rel.map(Some),
                                ..EntryPatch::default()
                            },
                        ),
                        Err(_) => println!("Invalid predecessor"),
                    },
                    _ => println!("Usage: pred <seq> <pred_seq|none> [FS|SS|FF|SF]"),
                }
            }
            "mstart" | "mend" => match (parts.next(), parts.next().map(parse_optional_date)) {
                (Some(seq_s), Some(Ok(date))) => {
                    let change = if cmd == "mstart" {
                        EntryPatch {
                            manual_start_date: Some(date),
                            ..EntryPatch::default()
                        }
                    } else {
                        EntryPatch {
                            manual_end_date: Some(date),
                            ..EntryPatch::default()
                        }
                    };
                    patch(&engine, &owner, &actor, seq_s, change)
                }
                (Some(_), Some(Err(msg))) => println!("{}", msg),
                _ => println!("Usage: {} <seq> <YYYY-MM-DD|none>", cmd),
            },
            "notes" => match parts.next() {
                Some(seq_s) => {
                    let text = parts.collect::<Vec<_>>().join(" ");
                    let notes = if text.is_empty() { None } else { Some(text) };
                    patch(
                        &engine,
                        &owner,
                        &actor,
                        seq_s,
                        EntryPatch {
                            notes: Some(notes),
                            ..EntryPatch::default()
                        },
                    )
                }
                None => println!("Usage: notes <seq> <text...>"),
            },
            "split" => {
                let Some(seq_s) = parts.next() else {
                    println!("Usage: split <seq> [parts|sizes_csv]");
                    continue;
                };
                let policy = match parse_split_policy(parts.next()) {
                    Ok(policy) => policy,
                    Err(msg) => {
                        println!("{}", msg);
                        continue;
                    }
                };
                match entry_at(&engine, &owner, seq_s) {
                    Ok(id) => match engine.split(&owner, id, &policy, &actor) {
                        Ok(entries) => {
                            println!("Split entry {seq_s}.");
                            print_entries(&entries);
                        }
                        Err(e) => println!("Error: {}", e),
                    },
                    Err(msg) => println!("{}", msg),
                }
            }
            "move" => {
                let seq_s = parts.next();
                let position = parts.next().and_then(|s| s.parse::<usize>().ok());
                let (Some(seq_s), Some(position)) = (seq_s, position) else {
                    println!("Usage: move <seq> <position>");
                    continue;
                };
                let id = match entry_at(&engine, &owner, seq_s) {
                    Ok(id) => id,
                    Err(msg) => {
                        println!("{}", msg);
                        continue;
                    }
                };
                let mut ids: Vec<EntryId> = match engine.entries(&owner) {
                    Ok(entries) => entries.iter().map(|e| e.id).filter(|e| *e != id).collect(),
                    Err(e) => {
                        println!("Error: {}", e);
                        continue;
                    }
                };
                ids.insert(position.min(ids.len()), id);
                match engine.reorder(&owner, &ids, &actor) {
                    Ok(entries) => {
                        println!("Moved entry {seq_s}.");
                        print_entries(&entries);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "delete" => match parts.next() {
                Some(seq_s) => match entry_at(&engine, &owner, seq_s) {
                    Ok(id) => match engine.delete(&owner, id, &actor) {
                        Ok(entries) => {
                            println!("Deleted entry {seq_s}.");
                            print_entries(&entries);
                        }
                        Err(e) => println!("Error: {}", e),
                    },
                    Err(msg) => println!("{}", msg),
                },
                None => println!("Usage: delete <seq>"),
            },
            "compute" => match engine.recalculate(&owner, &actor) {
                Ok(result) => {
                    println!(
                        "Recalculated ({} entries, {} changed, {} fallbacks)",
                        result.entries.len(),
                        result.changed,
                        result.inconsistencies.len()
                    );
                    for issue in &result.inconsistencies {
                        println!(
                            "  warning: entry {} -> predecessor {}: {}",
                            issue.sequence_order, issue.predecessor_sequence_order, issue.issue
                        );
                    }
                    for cycle in &result.cycles {
                        println!("  warning: predecessor cycle through {:?}", cycle);
                    }
                    print_entries(&result.entries);
                }
                Err(e) => println!("Recalculate error: {}", e),
            },
            "audit" => {
                for record in audit.records() {
                    println!(
                        "{}  {:<24} {}  {}",
                        record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                        record.action.as_str(),
                        record.actor_id,
                        record.details
                    );
                }
            }
            "save" => {
                let fmt = parts.next();
                let path = parts.next();
                let snapshot = match (engine.owner_settings(&owner), engine.entries(&owner)) {
                    (Ok(settings), Ok(entries)) => ProgrammeSnapshot::new(settings, entries),
                    (Err(e), _) | (_, Err(e)) => {
                        println!("Error: {}", e);
                        continue;
                    }
                };
                let result = match (fmt, path) {
                    (Some("json"), Some(path)) => save_programme_to_json(&snapshot, path),
                    (Some("csv"), Some(path)) => save_programme_to_csv(&snapshot, path),
                    _ => {
                        println!("Usage: save <json|csv> <path>");
                        continue;
                    }
                };
                match result {
                    Ok(_) => println!("Programme saved to {}.", path.unwrap_or_default()),
                    Err(e) => println!("Error saving programme: {}", e),
                }
            }
            "load" => {
                let fmt = parts.next();
                let path = parts.next();
                let loaded = match (fmt, path) {
                    (Some("json"), Some(path)) => load_programme_from_json(path),
                    (Some("csv"), Some(path)) => load_programme_from_csv(path),
                    _ => {
                        println!("Usage: load <json|csv> <path>");
                        continue;
                    }
                };
                match loaded {
                    Ok(snapshot) => {
                        let loaded_owner = snapshot.settings.owner_id.clone();
                        let stored = engine
                            .save_settings(&snapshot.settings)
                            .and_then(|_| engine.save_programme(&loaded_owner, snapshot.entries, &actor));
                        match stored {
                            Ok(entries) => {
                                owner = loaded_owner;
                                println!("Programme loaded from {}.", path.unwrap_or_default());
                                print_entries(&entries);
                            }
                            Err(e) => println!("Error loading programme: {}", e),
                        }
                    }
                    Err(e) => println!("Error loading programme: {}", e),
                }
            }
            _ => {
                println!("Unknown command. Type 'help'.");
            }
        }
    }
}
