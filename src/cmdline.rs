//! Serialize an argument set back into flags for a child build

use crate::args::{flag_name, ArgValue, ArgumentSet};

/// Flag tokens equivalent to `args`, in the set's iteration order.
///
/// `true` switches become `--name`, lists one `--name=item` per element and strings
/// `--name=value` (`--name=` when empty). False switches and empty lists emit nothing.
pub fn to_tokens(args: &ArgumentSet) -> Vec<String> {
    let mut tokens = Vec::new();
    for (key, value) in args.iter() {
        let name = flag_name(key);
        match value {
            ArgValue::Bool(true) => tokens.push(format!("--{}", name)),
            ArgValue::Bool(false) => {}
            ArgValue::Str(s) => tokens.push(format!("--{}={}", name, s)),
            ArgValue::List(items) => {
                tokens.extend(items.iter().map(|item| format!("--{}={}", name, item)))
            }
        }
    }
    tokens
}

/// Shell command-line string equivalent to `args`
pub fn to_command_line(args: &ArgumentSet) -> String {
    to_tokens(args)
        .iter()
        .map(|token| quote(token))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '=' | '.' | '/' | ',' | ':' | '+' | '@' | '%')
}

/// POSIX single-quote `token` when it contains anything the shell would interpret
pub fn quote(token: &str) -> String {
    if !token.is_empty() && token.chars().all(is_shell_safe) {
        return token.to_string();
    }
    format!("'{}'", token.replace('\'', r"'\''"))
}
