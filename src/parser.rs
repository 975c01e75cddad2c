//! Compiles one node body into a [`Program`].
//!
//! The body is scanned line by line and classified by leading markers
//! (`[[link]]`, `->` shortcuts, `<<...>>` control and commands, plain text),
//! then nested into block structure: shortcut blocks by indentation,
//! conditional chains by their `<<if>>`/`<<endif>>` markers.

use std::rc::Rc;

use crate::ast::{Branch, Expr, Link, Part, Program, ShortcutOption, Stmt, Template};
use crate::error::{Error, Result};
use crate::expression;
use crate::types::CommandCall;

pub(crate) fn compile(node: &str, body: &str) -> Result<Program> {
    let lines = classify(node, body)?;
    let mut parser = BlockParser {
        node,
        lines,
        pos: 0,
    };
    let stmts = parser.parse_stmts(0)?;
    if let Some(line) = parser.lines.get(parser.pos) {
        let marker = match line.kind {
            LineKind::ElseIf(_) => "<<elseif>>",
            LineKind::Else => "<<else>>",
            _ => "<<endif>>",
        };
        return Err(parser.err(line.number, format!("{marker} without a matching <<if>>")));
    }
    Ok(Program { stmts })
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    depth: usize,
    number: usize,
    kind: LineKind<'a>,
}

#[derive(Debug, Clone, Copy)]
enum LineKind<'a> {
    Text(&'a str),
    Link {
        label: Option<&'a str>,
        target: &'a str,
    },
    Shortcut {
        label: &'a str,
        guard: Option<&'a str>,
    },
    If(&'a str),
    ElseIf(&'a str),
    Else,
    EndIf,
    Set(&'a str),
    Command {
        name: &'a str,
        args: &'a str,
    },
}

fn classify<'a>(node: &str, body: &'a str) -> Result<Vec<Line<'a>>> {
    let err = |line: usize, message: String| Error::Parse {
        node: node.to_string(),
        line,
        message,
    };

    let mut lines = Vec::new();
    for (idx, raw) in body.lines().enumerate() {
        let number = idx + 1;
        let mut raw = raw.strip_suffix('\r').unwrap_or(raw);
        if idx == 0 {
            raw = raw.trim_start_matches('\u{feff}');
        }

        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }

        // Spaces count one column, tabs four; depth only matters relative
        // to shortcut markers.
        let mut depth = 0;
        for c in raw.chars() {
            match c {
                ' ' => depth += 1,
                '\t' => depth += 4,
                _ => break,
            }
        }

        let kind = if let Some(rest) = trimmed.strip_prefix("->") {
            let rest = rest.trim();
            let (label, guard) = match rest.find("<<") {
                Some(at) => {
                    let marker = rest[at..].trim();
                    let inner = marker
                        .strip_prefix("<<")
                        .and_then(|m| m.strip_suffix(">>"))
                        .ok_or_else(|| {
                            err(number, "unterminated '<<' after shortcut label".to_string())
                        })?;
                    let condition = inner.trim().strip_prefix("if").ok_or_else(|| {
                        err(
                            number,
                            "only an <<if>> guard may follow a shortcut label".to_string(),
                        )
                    })?;
                    if !condition.starts_with(char::is_whitespace) {
                        return Err(err(
                            number,
                            "only an <<if>> guard may follow a shortcut label".to_string(),
                        ));
                    }
                    (rest[..at].trim(), Some(condition.trim()))
                }
                None => (rest, None),
            };
            if label.is_empty() {
                return Err(err(number, "shortcut option is missing its label".to_string()));
            }
            LineKind::Shortcut { label, guard }
        } else if let Some(rest) = trimmed.strip_prefix("[[") {
            let inner = rest
                .strip_suffix("]]")
                .ok_or_else(|| err(number, "link line must end with ']]'".to_string()))?;
            match inner.split_once('|') {
                Some((label, target)) => {
                    let (label, target) = (label.trim(), target.trim());
                    if label.is_empty() || target.is_empty() {
                        return Err(err(
                            number,
                            "link needs both a label and a target".to_string(),
                        ));
                    }
                    LineKind::Link {
                        label: Some(label),
                        target,
                    }
                }
                None => {
                    let target = inner.trim();
                    if target.is_empty() {
                        return Err(err(number, "empty link target".to_string()));
                    }
                    LineKind::Link {
                        label: None,
                        target,
                    }
                }
            }
        } else if let Some(rest) = trimmed.strip_prefix("<<") {
            let inner = rest
                .strip_suffix(">>")
                .ok_or_else(|| err(number, "unterminated '<<'".to_string()))?
                .trim();
            if inner.is_empty() {
                return Err(err(number, "empty '<<>>' statement".to_string()));
            }
            let (head, args) = match inner.split_once(char::is_whitespace) {
                Some((head, args)) => (head, args.trim()),
                None => (inner, ""),
            };
            match head {
                "if" | "elseif" => {
                    if args.is_empty() {
                        return Err(err(number, format!("<<{head}>> is missing its condition")));
                    }
                    if head == "if" {
                        LineKind::If(args)
                    } else {
                        LineKind::ElseIf(args)
                    }
                }
                "else" | "endif" => {
                    if !args.is_empty() {
                        return Err(err(number, format!("<<{head}>> takes no argument")));
                    }
                    if head == "else" {
                        LineKind::Else
                    } else {
                        LineKind::EndIf
                    }
                }
                "set" => {
                    if args.is_empty() {
                        return Err(err(number, "<<set>> expects a $variable".to_string()));
                    }
                    LineKind::Set(args)
                }
                _ => LineKind::Command { name: head, args },
            }
        } else {
            LineKind::Text(trimmed)
        };

        lines.push(Line {
            depth,
            number,
            kind,
        });
    }
    Ok(lines)
}

struct BlockParser<'a> {
    node: &'a str,
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl<'a> BlockParser<'a> {
    fn err(&self, line: usize, message: impl Into<String>) -> Error {
        Error::Parse {
            node: self.node.to_string(),
            line,
            message: message.into(),
        }
    }

    fn parse_expr(&self, line: usize, source: &str) -> Result<Expr> {
        expression::parse(source).map_err(|e| self.err(line, e))
    }

    /// Parse statements until end of input, a dedent below `min_depth`, or a
    /// conditional terminator (left for the enclosing chain to consume).
    fn parse_stmts(&mut self, min_depth: usize) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while let Some(line) = self.lines.get(self.pos).copied() {
            if matches!(
                line.kind,
                LineKind::ElseIf(_) | LineKind::Else | LineKind::EndIf
            ) {
                break;
            }
            if line.depth < min_depth {
                break;
            }
            match line.kind {
                LineKind::Text(text) => {
                    self.pos += 1;
                    stmts.push(Stmt::Text(self.parse_template(line.number, text)?));
                }
                LineKind::Link { .. } => stmts.push(self.parse_links(min_depth)),
                LineKind::Set(raw) => {
                    self.pos += 1;
                    stmts.push(self.parse_set(line.number, raw)?);
                }
                LineKind::Command { name, args } => {
                    self.pos += 1;
                    stmts.push(Stmt::Command(CommandCall {
                        name: name.to_string(),
                        args: args.to_string(),
                    }));
                }
                LineKind::If(condition) => {
                    stmts.push(self.parse_conditional(line.number, condition, min_depth)?)
                }
                LineKind::Shortcut { .. } => stmts.push(self.parse_shortcuts()?),
                LineKind::ElseIf(_) | LineKind::Else | LineKind::EndIf => break,
            }
        }
        Ok(stmts)
    }

    /// Consecutive link lines become one group; a lone member is an
    /// automatic transfer at run time, several become a prompt.
    fn parse_links(&mut self, min_depth: usize) -> Stmt {
        let mut links = Vec::new();
        while let Some(line) = self.lines.get(self.pos).copied() {
            let LineKind::Link { label, target } = line.kind else {
                break;
            };
            if line.depth < min_depth {
                break;
            }
            self.pos += 1;
            links.push(Link {
                label: label.map(str::to_string),
                target: target.to_string(),
            });
        }
        Stmt::Links(links)
    }

    fn parse_set(&mut self, line: usize, raw: &str) -> Result<Stmt> {
        let rest = raw
            .trim()
            .strip_prefix('$')
            .ok_or_else(|| self.err(line, "<<set>> expects a $variable"))?;
        let name_end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        let starts_ok = name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        if !starts_ok {
            return Err(self.err(line, "<<set>> expects a $variable"));
        }

        let after = rest[name_end..].trim_start();
        let value_src = if let Some(r) = after.strip_prefix('=') {
            r
        } else if let Some(r) = after.strip_prefix("to") {
            if !r.starts_with(char::is_whitespace) {
                return Err(self.err(line, "<<set>> expects '=' or 'to' after the variable"));
            }
            r
        } else {
            return Err(self.err(line, "<<set>> expects '=' or 'to' after the variable"));
        };
        let value_src = value_src.trim();
        if value_src.is_empty() {
            return Err(self.err(line, "<<set>> is missing its value expression"));
        }

        Ok(Stmt::Set {
            name: name.to_string(),
            expr: self.parse_expr(line, value_src)?,
        })
    }

    fn parse_conditional(
        &mut self,
        if_line: usize,
        condition: &str,
        min_depth: usize,
    ) -> Result<Stmt> {
        self.pos += 1;
        let mut branches = Vec::new();
        let condition = self.parse_expr(if_line, condition)?;
        let block = self.parse_stmts(min_depth)?;
        branches.push(Branch {
            condition: Some(condition),
            block: into_block(block),
        });

        let mut saw_else = false;
        loop {
            let Some(line) = self.lines.get(self.pos).copied() else {
                return Err(self.err(if_line, "missing <<endif>>"));
            };
            match line.kind {
                LineKind::ElseIf(condition) => {
                    if saw_else {
                        return Err(self.err(line.number, "<<elseif>> after <<else>>"));
                    }
                    self.pos += 1;
                    let condition = self.parse_expr(line.number, condition)?;
                    let block = self.parse_stmts(min_depth)?;
                    branches.push(Branch {
                        condition: Some(condition),
                        block: into_block(block),
                    });
                }
                LineKind::Else => {
                    if saw_else {
                        return Err(self.err(line.number, "duplicate <<else>>"));
                    }
                    saw_else = true;
                    self.pos += 1;
                    let block = self.parse_stmts(min_depth)?;
                    branches.push(Branch {
                        condition: None,
                        block: into_block(block),
                    });
                }
                LineKind::EndIf => {
                    self.pos += 1;
                    break;
                }
                // parse_stmts stopped on a dedent before the chain closed
                _ => return Err(self.err(if_line, "missing <<endif>>")),
            }
        }
        Ok(Stmt::If(branches))
    }

    fn parse_shortcuts(&mut self) -> Result<Stmt> {
        let depth = self.lines[self.pos].depth;
        let mut options = Vec::new();
        while let Some(line) = self.lines.get(self.pos).copied() {
            let LineKind::Shortcut { label, guard } = line.kind else {
                break;
            };
            if line.depth != depth {
                break;
            }
            self.pos += 1;
            let label = self.parse_template(line.number, label)?;
            let guard = match guard {
                Some(source) => Some(self.parse_expr(line.number, source)?),
                None => None,
            };
            // The option's block is every following line strictly more
            // indented than its marker.
            let block = self.parse_stmts(depth + 1)?;
            options.push(ShortcutOption {
                label,
                guard,
                block: into_block(block),
            });
        }
        Ok(Stmt::Shortcuts(options))
    }

    fn parse_template(&self, line: usize, text: &str) -> Result<Template> {
        let chars: Vec<char> = text.chars().collect();
        let mut parts = Vec::new();
        let mut buf = String::new();
        let mut i = 0;
        while i < chars.len() {
            let ch = chars[i];
            if ch == '\\' && i + 1 < chars.len() {
                buf.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if ch == '{' {
                let Some(close) = chars[i + 1..].iter().position(|&c| c == '}') else {
                    return Err(self.err(line, "unterminated '{' interpolation"));
                };
                let source: String = chars[i + 1..i + 1 + close].iter().collect();
                if source.trim().is_empty() {
                    return Err(self.err(line, "empty '{}' interpolation"));
                }
                if !buf.is_empty() {
                    parts.push(Part::Text(std::mem::take(&mut buf)));
                }
                parts.push(Part::Expr(self.parse_expr(line, &source)?));
                i += close + 2;
                continue;
            }
            buf.push(ch);
            i += 1;
        }
        if !buf.is_empty() || parts.is_empty() {
            parts.push(Part::Text(buf));
        }
        Ok(Template { parts })
    }
}

fn into_block(stmts: Vec<Stmt>) -> Rc<Program> {
    Rc::new(Program { stmts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;

    fn compiled(body: &str) -> Program {
        compile("Test", body).expect("body compiles")
    }

    fn compile_err(body: &str) -> Error {
        compile("Test", body).expect_err("body must not compile")
    }

    #[test]
    fn text_lines_in_order() {
        let program = compiled("First line\nSecond line\n");
        assert_eq!(
            program.stmts,
            vec![
                Stmt::Text(Template::literal("First line")),
                Stmt::Text(Template::literal("Second line")),
            ]
        );
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        let program = compiled("// comment\n\nOnly line\n  // indented comment\n");
        assert_eq!(program.stmts.len(), 1);
    }

    #[test]
    fn interpolation_splits_text_into_parts() {
        let program = compiled("You have {$gold + 1} gold");
        let Stmt::Text(template) = &program.stmts[0] else {
            panic!("expected text");
        };
        assert_eq!(template.parts.len(), 3);
        assert!(matches!(&template.parts[0], Part::Text(t) if t == "You have "));
        assert!(matches!(
            &template.parts[1],
            Part::Expr(Expr::Binary(BinaryOp::Add, _, _))
        ));
        assert!(matches!(&template.parts[2], Part::Text(t) if t == " gold"));
    }

    #[test]
    fn escaped_braces_stay_literal() {
        let program = compiled(r"literal \{braces\}");
        assert_eq!(
            program.stmts,
            vec![Stmt::Text(Template::literal("literal {braces}"))]
        );
    }

    #[test]
    fn consecutive_links_form_one_group() {
        let program = compiled("[[First choice|A]]\n[[B]]\n");
        assert_eq!(
            program.stmts,
            vec![Stmt::Links(vec![
                Link {
                    label: Some("First choice".to_string()),
                    target: "A".to_string(),
                },
                Link {
                    label: None,
                    target: "B".to_string(),
                },
            ])]
        );
    }

    #[test]
    fn text_between_links_splits_the_group() {
        let program = compiled("[[A]]\nsome text\n[[B]]\n");
        assert_eq!(program.stmts.len(), 3);
        assert!(matches!(&program.stmts[0], Stmt::Links(l) if l.len() == 1));
        assert!(matches!(&program.stmts[2], Stmt::Links(l) if l.len() == 1));
    }

    #[test]
    fn set_with_equals_and_to() {
        let program = compiled("<<set $gold = 10>>\n<<set $gold to $gold + 5>>\n");
        assert!(matches!(
            &program.stmts[0],
            Stmt::Set { name, expr: Expr::Number(n) } if name == "gold" && *n == 10.0
        ));
        assert!(matches!(
            &program.stmts[1],
            Stmt::Set { name, expr: Expr::Binary(BinaryOp::Add, _, _) } if name == "gold"
        ));
    }

    #[test]
    fn conditional_chain_structure() {
        let program = compiled(
            "<<if $a == 1>>\nfirst\n<<elseif $a == 2>>\nsecond\n<<else>>\nthird\n<<endif>>\n",
        );
        let Stmt::If(branches) = &program.stmts[0] else {
            panic!("expected conditional");
        };
        assert_eq!(branches.len(), 3);
        assert!(branches[0].condition.is_some());
        assert!(branches[1].condition.is_some());
        assert!(branches[2].condition.is_none());
        assert_eq!(branches[2].block.stmts.len(), 1);
    }

    #[test]
    fn shortcut_nesting_by_indentation() {
        let program = compiled(
            "-> outer one\n    inner text\n    -> nested one\n        deep text\n-> outer two\nafter\n",
        );
        assert_eq!(program.stmts.len(), 2);
        let Stmt::Shortcuts(options) = &program.stmts[0] else {
            panic!("expected shortcut group");
        };
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].block.stmts.len(), 2);
        assert!(matches!(&options[0].block.stmts[1], Stmt::Shortcuts(nested) if nested.len() == 1));
        assert!(options[1].block.stmts.is_empty());
        assert!(matches!(&program.stmts[1], Stmt::Text(_)));
    }

    #[test]
    fn shortcut_guard_is_parsed() {
        let program = compiled("-> Bribe him <<if $gold >= 10>>\n    done\n");
        let Stmt::Shortcuts(options) = &program.stmts[0] else {
            panic!("expected shortcut group");
        };
        assert!(options[0].guard.is_some());
    }

    #[test]
    fn conditional_inside_shortcut_block() {
        let program = compiled(
            "-> option\n    <<if $seen>>\n    again\n    <<else>>\n    first time\n    <<endif>>\nafter\n",
        );
        let Stmt::Shortcuts(options) = &program.stmts[0] else {
            panic!("expected shortcut group");
        };
        assert!(matches!(&options[0].block.stmts[0], Stmt::If(b) if b.len() == 2));
    }

    #[test]
    fn unmatched_endif_is_an_error() {
        let err = compile_err("text\n<<endif>>\n");
        assert!(matches!(
            err,
            Error::Parse { line: 2, ref message, .. } if message.contains("without a matching")
        ));
    }

    #[test]
    fn missing_endif_is_an_error() {
        let err = compile_err("<<if true>>\ntext\n");
        assert!(matches!(
            err,
            Error::Parse { line: 1, ref message, .. } if message.contains("missing <<endif>>")
        ));
    }

    #[test]
    fn elseif_after_else_is_an_error() {
        let err = compile_err("<<if true>>\n<<else>>\n<<elseif false>>\n<<endif>>\n");
        assert!(matches!(
            err,
            Error::Parse { line: 3, ref message, .. } if message.contains("after <<else>>")
        ));
    }

    #[test]
    fn malformed_markup_errors_carry_the_line() {
        assert!(matches!(
            compile_err("ok\n[[broken\n"),
            Error::Parse { line: 2, .. }
        ));
        assert!(matches!(
            compile_err("<<set gold = 1>>\n"),
            Error::Parse { line: 1, .. }
        ));
        assert!(matches!(
            compile_err("-> choice <<unless $x>>\n"),
            Error::Parse { line: 1, .. }
        ));
        assert!(matches!(
            compile_err("text with {$unclosed\n"),
            Error::Parse { line: 1, .. }
        ));
        assert!(matches!(
            compile_err("{not an expression!}\n"),
            Error::Parse { line: 1, .. }
        ));
    }

    #[test]
    fn node_title_is_reported() {
        let err = compile("Broken", "<<endif>>").expect_err("must fail");
        assert!(matches!(err, Error::Parse { ref node, .. } if node == "Broken"));
    }
}
