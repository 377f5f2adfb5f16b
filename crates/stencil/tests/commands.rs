//! Caller-supplied commands and syntax overrides.

use serde_json::json;
use stencil::{CommandContext, CommandSet, CompileError, Options, Syntax};

fn nows(s: &str) -> String {
    s.split_whitespace().collect()
}

struct MyCommands;

impl CommandSet for MyCommands {
    fn contains(&self, name: &str) -> bool {
        matches!(name, "foo" | "bar")
    }

    fn compile(
        &self,
        name: &str,
        cc: &mut CommandContext<'_, '_, '_>,
    ) -> Result<(), CompileError> {
        match name {
            "foo" => {
                let expr =
                    cc.parse_expression(&format!("'[[' + ({}) + ']]'", cc.arg()))?;
                cc.emit_output(expr);
                Ok(())
            }
            "bar" => {
                let arg = cc.arg().to_string();
                cc.push_buffer();
                cc.parse_until(&["end"])?;
                cc.pop_buffer_into("__captured");
                let expr = cc.parse_expression(&format!(
                    "'<' + __captured.strip() + '><' + ({arg}) + '>'"
                ))?;
                cc.emit_output(expr);
                Ok(())
            }
            other => unreachable!("unknown command '{other}'"),
        }
    }
}

#[test]
fn test_commands() {
    let t = "
        @foo \"123\"
        @bar \"456\"
            789
        @end
    ";
    let commands = MyCommands;
    let mut opts = Options::new().commands(&commands);
    let s = stencil::render(t, &json!({}), &mut opts).unwrap();
    assert_eq!(nows(&s), "[[123]]<789><456>");
}

#[test]
fn test_command_compiles_nested_directives() {
    let t = "
        @bar 'x'
            @if aa
                yes
            @end
        @end
    ";
    let commands = MyCommands;
    let mut opts = Options::new().commands(&commands);
    let s = stencil::render(t, &json!({"aa": 1}), &mut opts).unwrap();
    assert_eq!(nows(&s), "<yes><x>");
}

#[test]
fn test_unknown_command_still_fails() {
    let commands = MyCommands;
    let opts = Options::new().commands(&commands);
    let err = stencil::compile("@nope", &opts).unwrap_err();
    assert_eq!(err.category, stencil::Category::UnknownCommand);
}

#[test]
fn test_custom_delims() {
    let t = "
        %if aa
            // comment
            hi
        %end
    ";
    let syntax = Syntax::new()
        .command(r"^\s*%(\w+)(.*)")
        .unwrap()
        .comment(r"^\s*//")
        .unwrap();
    let mut opts = Options::new().syntax(syntax);
    let s = stencil::render(t, &json!({"aa": 1}), &mut opts).unwrap();
    assert_eq!(nows(&s), "hi");
}

#[test]
fn test_custom_expression_delims() {
    let t = "
        {{5+5}}...{{6+6}}...{{aa}}
    ";
    let mut opts = Options::new().syntax(Syntax::new().markers("{{", "}}"));
    let s = stencil::render(t, &json!({"aa": 1}), &mut opts).unwrap();
    assert_eq!(nows(&s), "10...12...1");
}
