//! List commands implementation

use psramtest_board::available_backends;

/// List all backends compiled into this binary
pub fn list_backends() {
    let backends = available_backends();
    if backends.is_empty() {
        println!("No backends available (recompile with features)");
        return;
    }

    println!("Available backends:");
    println!();
    for backend in &backends {
        println!("  {:<11} - {}", backend.name, backend.description);
        if !backend.aliases.is_empty() {
            println!("  {:<11}   aliases: {}", "", backend.aliases.join(", "));
        }
    }
    println!();
    println!("Board options (any backend):");
    println!("  gpiochip=N | gpiodev=PATH   chip for the board lines");
    println!("  pulse=N                     timing pulse line");
    println!("  led=N                       status LED, on while running");
    println!("  io2=N, io3=N                quad-mode lines held high");
}
