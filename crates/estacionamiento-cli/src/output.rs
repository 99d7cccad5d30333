//! Status-line printing for one-shot commands.

pub fn print_header(use_colors: bool, title: &str) {
    println!();
    let underline = "=".repeat(title.chars().count());
    if use_colors {
        println!("\x1b[1m{title}\x1b[0m");
        println!("\x1b[1m{underline}\x1b[0m");
    } else {
        println!("{title}");
        println!("{underline}");
    }
    println!();
}

pub fn print_success(use_colors: bool, msg: &str) {
    if use_colors {
        println!("  \x1b[32m\u{2713}\x1b[0m {}", msg);
    } else {
        println!("  OK: {}", msg);
    }
}

pub fn print_error(use_colors: bool, msg: &str) {
    if use_colors {
        println!("  \x1b[31m\u{2717}\x1b[0m {}", msg);
    } else {
        println!("  ERROR: {}", msg);
    }
}

pub fn print_warning(use_colors: bool, msg: &str) {
    if use_colors {
        println!("  \x1b[33m!\x1b[0m {}", msg);
    } else {
        println!("  WARN: {}", msg);
    }
}

pub fn print_status(use_colors: bool, msg: &str) {
    if use_colors {
        println!("  \x1b[2m-\x1b[0m {}", msg);
    } else {
        println!("  {}", msg);
    }
}
