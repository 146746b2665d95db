//! Command construction: quoting, substitution and assembly
//!
//! A [`CommandSpec`] is the literal text of a command interleaved with
//! substituted values. Assembling it quotes every value so that it reaches
//! the shell as a single word (or, for lists, as one word per element).

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::output::ProcessResult;

/// A value substituted into a command line
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// A single word; `None` substitutes the text `undefined`
    Scalar(Option<String>),
    /// Several words, each quoted on its own and joined with spaces
    List(Vec<ArgValue>),
    /// The stdout of an earlier command, minus its trailing newline
    Prior(ProcessResult),
}

impl ArgValue {
    /// The unquoted text this value stands for
    pub fn substitute(&self) -> String {
        match self {
            ArgValue::Scalar(Some(text)) => text.clone(),
            ArgValue::Scalar(None) => "undefined".to_string(),
            ArgValue::List(items) => items
                .iter()
                .map(ArgValue::substitute)
                .collect::<Vec<_>>()
                .join(" "),
            ArgValue::Prior(result) => result.trimmed_stdout().to_string(),
        }
    }

    /// The shell-safe text placed into the command line
    pub fn to_token(&self) -> String {
        match self {
            ArgValue::List(items) => items
                .iter()
                .map(ArgValue::to_token)
                .collect::<Vec<_>>()
                .join(" "),
            other => quote(&other.substitute()),
        }
    }
}

/// Whether `token` can be passed to the shell without quoting
///
/// Only ASCII letters, digits and `/_.-` are considered safe. The empty
/// string is passed through as is.
pub fn is_safe_token(token: &str) -> bool {
    token
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'/' | b'_' | b'.' | b'-'))
}

/// Quote `token` for the shell using ANSI-C quoting (`$'...'`)
pub fn quote(token: &str) -> String {
    if is_safe_token(token) {
        return token.to_string();
    }

    let mut quoted = String::with_capacity(token.len() + 3);
    quoted.push_str("$'");
    for c in token.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\x0c' => quoted.push_str("\\f"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\x0b' => quoted.push_str("\\v"),
            '\0' => quoted.push_str("\\0"),
            c => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

/// Literal fragments interleaved with substituted arguments
///
/// Always holds exactly one more fragment than arguments. Build one with the
/// [`cmd!`](crate::cmd) macro, [`CommandSpec::template`] or
/// [`CommandSpec::builder`].
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    fragments: Vec<String>,
    args: Vec<ArgValue>,
}

impl CommandSpec {
    /// Create a spec from its parts, checking the fragment count
    pub fn new(fragments: Vec<String>, args: Vec<ArgValue>) -> Result<Self> {
        if fragments.len() != args.len() + 1 {
            return Err(Error::template(format!(
                "{} fragments cannot surround {} arguments",
                fragments.len(),
                args.len()
            )));
        }
        Ok(Self { fragments, args })
    }

    /// A command without substitutions
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            fragments: vec![text.into()],
            args: Vec::new(),
        }
    }

    /// Parse a `{}` template, e.g. `"echo {} to {}"`
    ///
    /// `{{` and `}}` stand for literal braces.
    pub fn template<I>(template: &str, args: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<ArgValue>,
    {
        let mut fragments = Vec::new();
        let mut current = String::new();
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            match (c, chars.peek().copied()) {
                ('{', Some('{')) => {
                    chars.next();
                    current.push('{');
                }
                ('{', Some('}')) => {
                    chars.next();
                    fragments.push(std::mem::take(&mut current));
                }
                ('}', Some('}')) => {
                    chars.next();
                    current.push('}');
                }
                ('{' | '}', _) => {
                    return Err(Error::template(format!(
                        "unmatched `{}` in {:?}",
                        c, template
                    )));
                }
                (c, _) => current.push(c),
            }
        }
        fragments.push(current);

        let args: Vec<ArgValue> = args.into_iter().map(Into::into).collect();
        if fragments.len() != args.len() + 1 {
            return Err(Error::template(format!(
                "{:?} has {} placeholders but {} arguments were given",
                template,
                fragments.len() - 1,
                args.len()
            )));
        }
        Ok(Self { fragments, args })
    }

    /// Used by [`cmd!`](crate::cmd), which guarantees the fragment count
    #[doc(hidden)]
    pub fn from_parts(fragments: Vec<String>, args: Vec<ArgValue>) -> Self {
        debug_assert_eq!(fragments.len(), args.len() + 1);
        Self { fragments, args }
    }

    /// Create a builder for this spec (for chaining)
    pub fn builder() -> CommandSpecBuilder {
        CommandSpecBuilder {
            fragments: vec![String::new()],
            args: Vec::new(),
        }
    }

    /// The literal fragments
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// The substituted arguments
    pub fn args(&self) -> &[ArgValue] {
        &self.args
    }

    /// Interleave fragments with quoted arguments into one command line
    pub fn assemble(&self) -> String {
        let mut line = self.fragments[0].clone();
        for (arg, fragment) in self.args.iter().zip(&self.fragments[1..]) {
            line.push_str(&arg.to_token());
            line.push_str(fragment);
        }
        line
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.assemble())
    }
}

/// Builder wrapper for more ergonomic spec construction
#[derive(Debug, Clone)]
pub struct CommandSpecBuilder {
    fragments: Vec<String>,
    args: Vec<ArgValue>,
}

impl CommandSpecBuilder {
    /// Append literal text
    pub fn text(mut self, text: &str) -> Self {
        if let Some(last) = self.fragments.last_mut() {
            last.push_str(text);
        }
        self
    }

    /// Append a substituted argument
    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.args.push(value.into());
        self.fragments.push(String::new());
        self
    }

    /// Build the spec
    pub fn build(self) -> CommandSpec {
        CommandSpec::from_parts(self.fragments, self.args)
    }
}

/// Build a [`CommandSpec`] from string literals and `{expr}` substitutions
///
/// ```
/// use lazy_command::cmd;
///
/// let name = "foo bar";
/// let spec = cmd!("mkdir /tmp/" {name});
/// assert_eq!(spec.assemble(), "mkdir /tmp/$'foo bar'");
/// ```
#[macro_export]
macro_rules! cmd {
    ($($tokens:tt)*) => {
        $crate::__cmd_parts!([] [] [] $($tokens)*)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __cmd_parts {
    ([$($frag:expr),*] [$($arg:expr),*] [$($text:expr),*]) => {
        $crate::CommandSpec::from_parts(
            ::std::vec![$($frag,)* <[&str]>::concat(&[$($text),*])],
            ::std::vec![$($arg),*],
        )
    };
    ([$($frag:expr),*] [$($arg:expr),*] [$($text:expr),*] { $value:expr } $($rest:tt)*) => {
        $crate::__cmd_parts!(
            [$($frag,)* <[&str]>::concat(&[$($text),*])]
            [$($arg,)* $crate::ArgValue::from($value)]
            []
            $($rest)*
        )
    };
    ([$($frag:expr),*] [$($arg:expr),*] [$($text:expr),*] $lit:literal $($rest:tt)*) => {
        $crate::__cmd_parts!([$($frag),*] [$($arg),*] [$($text,)* $lit] $($rest)*)
    };
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Scalar(Some(value.to_string()))
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Scalar(Some(value))
    }
}

impl From<&String> for ArgValue {
    fn from(value: &String) -> Self {
        ArgValue::Scalar(Some(value.clone()))
    }
}

impl From<Cow<'_, str>> for ArgValue {
    fn from(value: Cow<'_, str>) -> Self {
        ArgValue::Scalar(Some(value.into_owned()))
    }
}

impl From<&Path> for ArgValue {
    fn from(value: &Path) -> Self {
        ArgValue::Scalar(Some(value.to_string_lossy().into_owned()))
    }
}

impl From<PathBuf> for ArgValue {
    fn from(value: PathBuf) -> Self {
        ArgValue::from(value.as_path())
    }
}

impl From<&PathBuf> for ArgValue {
    fn from(value: &PathBuf) -> Self {
        ArgValue::from(value.as_path())
    }
}

impl From<ProcessResult> for ArgValue {
    fn from(value: ProcessResult) -> Self {
        ArgValue::Prior(value)
    }
}

impl From<&ProcessResult> for ArgValue {
    fn from(value: &ProcessResult) -> Self {
        ArgValue::Prior(value.clone())
    }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ArgValue::Scalar(None))
    }
}

impl<T: Into<ArgValue>> From<Vec<T>> for ArgValue {
    fn from(values: Vec<T>) -> Self {
        ArgValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ArgValue> + Clone> From<&Vec<T>> for ArgValue {
    fn from(values: &Vec<T>) -> Self {
        ArgValue::from(values.as_slice())
    }
}

impl<T: Into<ArgValue> + Clone> From<&[T]> for ArgValue {
    fn from(values: &[T]) -> Self {
        ArgValue::List(values.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<ArgValue>, const N: usize> From<[T; N]> for ArgValue {
    fn from(values: [T; N]) -> Self {
        ArgValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ArgValue> + Clone, const N: usize> From<&[T; N]> for ArgValue {
    fn from(values: &[T; N]) -> Self {
        ArgValue::from(values.as_slice())
    }
}

macro_rules! display_arg {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ArgValue {
                fn from(value: $ty) -> Self {
                    ArgValue::Scalar(Some(value.to_string()))
                }
            }
        )*
    };
}

display_arg!(bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_tokens_pass_through() {
        for token in ["", "foo", "/usr/bin/env", "a_b.c-d", "ABC123"] {
            assert_eq!(quote(token), token);
        }
    }

    #[test]
    fn test_unsafe_tokens_are_ansi_c_quoted() {
        assert_eq!(quote("foo bar"), "$'foo bar'");
        assert_eq!(quote("it's"), "$'it\\'s'");
        assert_eq!(quote("a\\b"), "$'a\\\\b'");
        assert_eq!(quote("l1\nl2\tx\r"), "$'l1\\nl2\\tx\\r'");
        assert_eq!(quote("\x0b\x0c\0"), "$'\\v\\f\\0'");
        assert_eq!(quote("$HOME"), "$'$HOME'");
        assert_eq!(quote("héllo"), "$'héllo'");
    }

    #[test]
    fn test_substitute_scalars() {
        assert_eq!(ArgValue::from("x").substitute(), "x");
        assert_eq!(ArgValue::from(None::<&str>).substitute(), "undefined");
        assert_eq!(ArgValue::from(42).substitute(), "42");
        assert_eq!(ArgValue::from(true).substitute(), "true");
    }

    #[test]
    fn test_substitute_prior_result() {
        let prior = ProcessResult::builder().stdout("main\n").build();
        let arg = ArgValue::from(&prior);
        assert_eq!(arg.substitute(), "main");
        assert_eq!(arg.to_token(), "main");
    }

    #[test]
    fn test_list_quotes_each_element() {
        let arg = ArgValue::from(vec!["echo", "foo bar", "it's"]);
        assert_eq!(arg.to_token(), "echo $'foo bar' $'it\\'s'");
    }

    #[test]
    fn test_list_equals_separate_substitutions() {
        let list = cmd!("git " {["log", "--oneline", "a b"]});
        let separate = cmd!("git " {"log"} " " {"--oneline"} " " {"a b"});
        assert_eq!(list.assemble(), separate.assemble());
    }

    #[test]
    fn test_cmd_macro_shapes() {
        let foo = "foo";
        let bar = String::from("bar baz");

        let spec = cmd!("echo " {foo} " to " {&bar});
        assert_eq!(spec.fragments(), &["echo ", " to ", ""]);
        assert_eq!(spec.args().len(), 2);
        assert_eq!(spec.assemble(), "echo foo to $'bar baz'");

        assert_eq!(cmd!("ls").assemble(), "ls");
        assert_eq!(cmd!({foo}).fragments(), &["", ""]);
        assert_eq!(cmd!("a" "b" {foo} "c").assemble(), "abfooc");
        assert_eq!(cmd!({foo} ":" {foo}).assemble(), "foo:foo");
    }

    #[test]
    fn test_template() {
        let spec = CommandSpec::template("echo {} to {}", ["a b", "c"]).unwrap();
        assert_eq!(spec.assemble(), "echo $'a b' to c");

        let spec = CommandSpec::template("awk '{{print $1}}' {}", ["file"]).unwrap();
        assert_eq!(spec.assemble(), "awk '{print $1}' file");
    }

    #[test]
    fn test_template_errors() {
        assert!(matches!(
            CommandSpec::template("echo {}", Vec::<String>::new()),
            Err(Error::Template { .. })
        ));
        assert!(CommandSpec::template("echo", ["extra"]).is_err());
        assert!(CommandSpec::template("echo {", Vec::<String>::new()).is_err());
        assert!(CommandSpec::new(vec![], vec![]).is_err());
    }

    #[test]
    fn test_builder() {
        let spec = CommandSpec::builder()
            .text("cp ")
            .arg(Path::new("/tmp/a file"))
            .text(" ")
            .arg("dest")
            .build();
        assert_eq!(spec.assemble(), "cp $'/tmp/a file' dest");
        assert_eq!(spec.to_string(), spec.assemble());
    }
}
