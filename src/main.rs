use std::path::PathBuf;

use anyhow::{Context, Result};
use brewvm::descriptor::MethodDescriptor;
use brewvm::method_area::ClassPathLoader;
use brewvm::{Runtime, Value};
use clap::Parser;
use tracing::Level;

#[derive(Parser)]
#[command(name = "brewvm")]
#[command(about = "Load a class and bind a frame for one of its static methods")]
#[command(version)]
struct Cli {
    /// Class to load, e.g. `demo/Main` or `demo.Main`
    #[arg(value_name = "CLASS")]
    class: String,

    /// Directories searched for class files
    #[arg(short, long = "classpath", value_name = "DIR", default_value = ".")]
    classpath: Vec<PathBuf>,

    /// Static method to bind
    #[arg(short, long, default_value = "main")]
    method: String,

    /// Descriptor of the method
    #[arg(short, long, default_value = "([Ljava/lang/String;)V")]
    descriptor: String,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let descriptor = MethodDescriptor::parse(&cli.descriptor)
        .with_context(|| format!("invalid descriptor {}", cli.descriptor))?;
    // Arguments start out as their type's zero value, `null` for `main`.
    let arguments: Vec<Value> = descriptor
        .params
        .iter()
        .map(|param| param.default_value())
        .collect();

    let mut runtime = Runtime::new(ClassPathLoader::new(&cli.classpath));
    let frame = runtime
        .invoke_static(&cli.class, &cli.method, &cli.descriptor, &arguments)
        .with_context(|| format!("cannot bind {}.{}{}", cli.class, cli.method, cli.descriptor))?;

    println!("class:       {}", frame.class().name());
    println!("method:      {}{}", cli.method, descriptor);
    println!("max locals:  {}", frame.local_count());
    println!("max stack:   {}", frame.max_stack());
    println!("code length: {}", frame.code_length());
    for index in 0..usize::from(frame.local_count()) {
        println!("local {index}:     {}", frame.local(index)?);
    }
    if let Some(exceptions) = frame.exceptions() {
        for index in &exceptions.exception_index_table {
            println!("throws:      {}", frame.constant_pool().format_entry(*index)?);
        }
    }
    let code: Vec<String> = frame.code(0).iter().map(|b| format!("{b:02x}")).collect();
    println!("code:        {}", code.join(" "));
    Ok(())
}
