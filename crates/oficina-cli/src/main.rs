// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use oficina_app::{EstimateEdit, LineField, LineSection, MaterialCategory, OrderId};
use oficina_db::Store;
use oficina_testkit::ScriptedOracle;
use runtime::{
    CardChange, MaterialChange, MaterialField, OracleBackend, Runtime, parse_amount,
    parse_category,
};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEMO_SEED: u64 = 2026;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `oficina --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;
    init_logging(config.log_level());

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or OFICINA_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    if options.demo {
        runtime::seed_demo_orders(&store, DEMO_SEED)?;
    }

    let needs_oracle = options.check_only
        || matches!(options.command, Some(Command::Quote { .. }));
    let oracle = if options.demo {
        OracleBackend::Scripted(ScriptedOracle::new(DEMO_SEED))
    } else if needs_oracle && config.oracle_enabled() {
        OracleBackend::Remote(build_oracle_client(&config).with_context(|| {
            format!(
                "invalid [oracle] config in {}; fix base_url/api_key_env/models/timeout values",
                options.config_path.display()
            )
        })?)
    } else {
        OracleBackend::Disabled
    };
    if options.check_only {
        tracing::info!(db = %db_path.display(), "configuration ok");
        return Ok(());
    }

    let Some(command) = options.command else {
        print_help();
        return Ok(());
    };

    let runtime = Runtime::new(&store, oracle, config.shop_profile());
    let output = match command {
        Command::Quote {
            client,
            image,
            repaired,
        } => runtime.quote(&client, &image, repaired.as_deref())?,
        Command::Orders => runtime.orders()?,
        Command::Show(id) => runtime.show(id)?,
        Command::Edit { id, edits } => runtime.edit(id, &edits)?,
        Command::Message(id) => runtime.message(id)?,
        Command::Whatsapp(id) => runtime.whatsapp(id)?,
        Command::Email(id) => runtime.email(id)?,
        Command::Print { id, out } => runtime.print(id, &out)?,
        Command::Delete(id) => runtime.delete(id)?,
        Command::Materials(change) => runtime.materials(change.as_ref())?,
        Command::LaborRate(rate) => runtime.labor_rate(rate)?,
        Command::VideoUrl(url) => runtime.video_url(url.as_deref())?,
        Command::Cards(change) => runtime.cards(change.as_ref())?,
    };
    print!("{output}");
    Ok(())
}

fn build_oracle_client(config: &Config) -> Result<oficina_llm::Client> {
    oficina_llm::Client::new(
        config.oracle_base_url(),
        &config.oracle_api_key()?,
        config.oracle_estimate_model(),
        config.oracle_image_model(),
        config.oracle_timeout()?,
    )
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Quote {
        client: PathBuf,
        image: PathBuf,
        repaired: Option<PathBuf>,
    },
    Orders,
    Show(OrderId),
    Edit {
        id: OrderId,
        edits: Vec<EstimateEdit>,
    },
    Message(OrderId),
    Whatsapp(OrderId),
    Email(OrderId),
    Print {
        id: OrderId,
        out: PathBuf,
    },
    Delete(OrderId),
    Materials(Option<MaterialChange>),
    LaborRate(Option<f64>),
    VideoUrl(Option<String>),
    Cards(Option<CardChange>),
}

#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    command: Option<Command>,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
        command: None,
    };
    let mut positional = Vec::new();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            "--" => {
                positional.extend(iter.by_ref().map(|rest| rest.as_ref().to_owned()));
            }
            flag if flag.starts_with("--") && positional.is_empty() => {
                return Err(anyhow!(
                    "unknown argument {flag:?}; run with --help to see supported options"
                ));
            }
            value => positional.push(value.to_owned()),
        }
    }

    if !positional.is_empty() {
        options.command = Some(parse_command(&positional)?);
    }
    Ok(options)
}

fn parse_command(args: &[String]) -> Result<Command> {
    let (name, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("missing command; run with --help to see commands"))?;
    let arity = |min: usize, max: usize, usage: &str| -> Result<()> {
        if rest.len() < min || rest.len() > max {
            bail!("usage: oficina {usage}");
        }
        Ok(())
    };

    let command = match name.as_str() {
        "quote" => {
            arity(2, 3, "quote <client.toml> <image> [repaired-out]")?;
            Command::Quote {
                client: PathBuf::from(&rest[0]),
                image: PathBuf::from(&rest[1]),
                repaired: rest.get(2).map(PathBuf::from),
            }
        }
        "orders" => {
            arity(0, 0, "orders")?;
            Command::Orders
        }
        "show" => {
            arity(1, 1, "show <id>")?;
            Command::Show(parse_order_id(&rest[0])?)
        }
        "edit" => {
            if rest.len() < 2 {
                bail!("usage: oficina edit <id> <op>... (see --help for ops)");
            }
            Command::Edit {
                id: parse_order_id(&rest[0])?,
                edits: parse_edit_ops(&rest[1..])?,
            }
        }
        "message" => {
            arity(1, 1, "message <id>")?;
            Command::Message(parse_order_id(&rest[0])?)
        }
        "whatsapp" => {
            arity(1, 1, "whatsapp <id>")?;
            Command::Whatsapp(parse_order_id(&rest[0])?)
        }
        "email" => {
            arity(1, 1, "email <id>")?;
            Command::Email(parse_order_id(&rest[0])?)
        }
        "print" => {
            arity(2, 2, "print <id> <out.html>")?;
            Command::Print {
                id: parse_order_id(&rest[0])?,
                out: PathBuf::from(&rest[1]),
            }
        }
        "delete" => {
            arity(1, 1, "delete <id>")?;
            Command::Delete(parse_order_id(&rest[0])?)
        }
        "materials" => Command::Materials(parse_material_change(rest)?),
        "labor-rate" => {
            arity(0, 1, "labor-rate [value]")?;
            Command::LaborRate(rest.first().map(|raw| parse_amount(raw)).transpose()?)
        }
        "video-url" => {
            arity(0, 1, "video-url [url]")?;
            Command::VideoUrl(rest.first().cloned())
        }
        "cards" => Command::Cards(parse_card_change(rest)?),
        unknown => bail!("unknown command {unknown:?}; run with --help to see commands"),
    };
    Ok(command)
}

fn parse_edit_ops(args: &[String]) -> Result<Vec<EstimateEdit>> {
    let mut edits = Vec::new();
    let mut iter = args.iter();
    while let Some(op) = iter.next() {
        let mut take = |what: &str| {
            iter.next()
                .ok_or_else(|| anyhow!("edit op {op:?} needs {what}"))
        };
        let edit = match op.as_str() {
            "add" => EstimateEdit::Add(parse_section(take("a section")?)?),
            "remove" => {
                let section = parse_section(take("a section")?)?;
                EstimateEdit::Remove(section, parse_index(take("an index")?)?)
            }
            "name" | "price" => {
                let section = parse_section(take("a section")?)?;
                let index = parse_index(take("an index")?)?;
                let value = take("a value")?.clone();
                let field = if op == "name" {
                    LineField::Name
                } else {
                    LineField::EstimatedPrice
                };
                EstimateEdit::Update {
                    section,
                    index,
                    field,
                    value,
                }
            }
            "hours" => EstimateEdit::LaborHours(take("a value")?.clone()),
            "labor" => EstimateEdit::LaborCost(take("a value")?.clone()),
            "summary" => EstimateEdit::Summary(take("text")?.clone()),
            unknown => bail!(
                "unknown edit op {unknown:?}; use add, remove, name, price, hours, labor, or summary"
            ),
        };
        edits.push(edit);
    }
    Ok(edits)
}

fn parse_material_change(args: &[String]) -> Result<Option<MaterialChange>> {
    let change = match args {
        [] => return Ok(None),
        [op, name, unit, price, category @ ..] if op == "add" && category.len() <= 1 => {
            MaterialChange::Add {
                name: name.clone(),
                unit: unit.clone(),
                price: parse_amount(price)?,
                category: category
                    .first()
                    .map(|raw| parse_category(raw))
                    .transpose()?
                    .unwrap_or(MaterialCategory::Preparation),
            }
        }
        [op, id, field, value] if op == "set" => MaterialChange::Set {
            id: id.clone(),
            field: MaterialField::parse(field).ok_or_else(|| {
                anyhow!("unknown material field {field:?}; use name, unit, price, or category")
            })?,
            value: value.clone(),
        },
        [op, id] if op == "remove" => MaterialChange::Remove(id.clone()),
        _ => bail!(
            "usage: oficina materials [add <name> <unit> <price> [category] | set <id> <field> <value> | remove <id>]"
        ),
    };
    Ok(Some(change))
}

fn parse_card_change(args: &[String]) -> Result<Option<CardChange>> {
    let change = match args {
        [] => return Ok(None),
        [op, id, title] if op == "title" => CardChange::Title {
            id: id.clone(),
            title: title.clone(),
        },
        [op, id, source] if op == "image" => CardChange::Image {
            id: id.clone(),
            source: source.clone(),
        },
        [op, id] if op == "restore" => CardChange::Restore(id.clone()),
        _ => bail!(
            "usage: oficina cards [title <id> <text> | image <id> <url-or-file> | restore <id>]"
        ),
    };
    Ok(Some(change))
}

fn parse_section(raw: &str) -> Result<LineSection> {
    LineSection::parse(raw)
        .ok_or_else(|| anyhow!("unknown section {raw:?}; use `parts` or `materials`"))
}

fn parse_index(raw: &str) -> Result<usize> {
    raw.parse()
        .with_context(|| format!("invalid index {raw:?}; use the number shown by `oficina show`"))
}

fn parse_order_id(raw: &str) -> Result<OrderId> {
    let value: i64 = raw
        .trim_start_matches('#')
        .parse()
        .with_context(|| format!("invalid order id {raw:?}; use a number from `oficina orders`"))?;
    Ok(OrderId::new(value))
}

fn print_help() {
    println!("oficina: auto body repair quotes");
    println!();
    println!("usage: oficina [options] <command>");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Use seeded demo data (in-memory) and a fake oracle");
    println!("  --check                  Validate config + DB + oracle settings");
    println!("  --help                   Show this help");
    println!();
    println!("commands:");
    println!("  quote <client.toml> <image> [repaired-out]  Run the customer quote flow");
    println!("  orders                                      List orders, newest first");
    println!("  show <id>                                   Show an order's estimate");
    println!("  edit <id> <op>...                           Edit an estimate and approve it");
    println!("      ops: add <section> | remove <section> <index>");
    println!("           name <section> <index> <text> | price <section> <index> <value>");
    println!("           hours <value> | labor <value> | summary <text>");
    println!("      sections: parts, materials");
    println!("  message <id>                                Print the chat message");
    println!("  whatsapp <id>                               Print a WhatsApp share link");
    println!("  email <id>                                  Print a mailto link");
    println!("  print <id> <out.html>                       Write the printable quote");
    println!("  delete <id>                                 Delete an order");
    println!("  materials [change]                          List or change the material price table");
    println!("      add <name> <unit> <price> [category] | set <id> <field> <value> | remove <id>");
    println!("      fields: name, unit, price, category");
    println!("      categories: preparation (default), paint, consumables");
    println!("  labor-rate [value]                          Show or set the hourly labor rate");
    println!("  video-url [url]                             Show or set the landing video");
    println!("  cards [change]                              List or change the landing service cards");
    println!("      title <id> <text> | image <id> <url-or-file> | restore <id>");
    println!();
    println!("client.toml holds snake_case fields: full_name, cpf, phone, email, zip_code,");
    println!("address, number, complement (optional), neighborhood, city, state, car_model,");
    println!("car_plate, car_year, car_color.");
}
