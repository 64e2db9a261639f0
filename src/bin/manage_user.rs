use std::{
    error::Error,
    io::{self},
    path::Path,
    process::exit,
};

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use expense_ledger::{
    Email, PasswordHash, User, ValidatedPassword, get_user_by_email, revoke_user_sessions,
    set_user_disabled, update_password,
};

/// A utility for administering registered users.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The email address of the user to manage.
    #[arg(long)]
    email: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set a new password for the user and log them out everywhere.
    ResetPassword {
        /// The bcrypt cost for hashing the new password.
        #[arg(long, default_value_t = bcrypt::DEFAULT_COST)]
        password_cost: u32,
    },
    /// Stop the user from logging in and end their sessions.
    Disable,
    /// Allow a disabled user to log in again.
    Enable,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let db_path = Path::new(&args.db_path);
    validate_db_path(db_path);

    let mut connection = Connection::open(db_path)?;
    let user = get_user(&args.email, &connection);

    match args.command {
        Command::ResetPassword { password_cost } => {
            println!("Resetting password for {}", user.email);

            let password_hash = match get_new_password_hash(&user, password_cost) {
                Some(password_hash) => password_hash,
                None => return Ok(()),
            };

            let transaction = connection.transaction()?;
            update_password(user.id, &password_hash, &transaction)?;
            let revoked = revoke_user_sessions(user.id, &transaction)?;
            transaction.commit()?;

            println!("Password updated successfully! Ended {revoked} session(s).");
        }
        Command::Disable => {
            let transaction = connection.transaction()?;
            set_user_disabled(user.id, true, &transaction)?;
            let revoked = revoke_user_sessions(user.id, &transaction)?;
            transaction.commit()?;

            println!("Disabled {}. Ended {revoked} session(s).", user.email);
        }
        Command::Enable => {
            set_user_disabled(user.id, false, &connection)?;

            println!("Enabled {}.", user.email);
        }
    }

    Ok(())
}

fn get_user(raw_email: &str, connection: &Connection) -> User {
    let email = match Email::new(raw_email) {
        Ok(email) => email,
        Err(error) => {
            print_error(error);
            exit(1);
        }
    };

    match get_user_by_email(&email, connection) {
        Ok(user) => user,
        Err(error) => {
            print_error(format!("Could not get the user {email}: {error}"));
            exit(1);
        }
    }
}

fn validate_db_path(db_path: &Path) {
    match db_path.extension() {
        None => {
            print_error("Database path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            print_error("Database path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if !db_path.is_file() {
        eprintln!("File does not exist at {db_path:#?}!");
        exit(1);
    }
}

fn get_new_password_hash(user: &User, password_cost: u32) -> Option<PasswordHash> {
    let user_inputs: [&str; 2] = [user.email.as_ref(), user.name.as_ref()];

    loop {
        println!();

        let first_password = prompt_password("Enter a new password: ")?;

        let validated_password = match ValidatedPassword::new(&first_password, &user_inputs) {
            Ok(password) => password,
            Err(error) => {
                print_error(error);
                continue;
            }
        };

        let second_password = prompt_password("Enter the same password again: ")?;

        if first_password != second_password {
            print_error("Passwords must match, try again.");
            continue;
        }

        match PasswordHash::new(validated_password, password_cost) {
            Ok(password_hash) => return Some(password_hash),
            Err(error) => {
                print_error(format!("Could not hash password: {error}. Try again."));
            }
        }
    }
}

/// Read a password from the terminal, `None` if input ended or failed.
fn prompt_password(prompt: &str) -> Option<String> {
    match rpassword::prompt_password(prompt) {
        Ok(string) => Some(string),
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => None,
        Err(error) => {
            print_error(format!("Could not read password from stdin: {error}"));
            None
        }
    }
}

fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    )
}

fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}
