//! AST module: node types and traversal.

pub mod types;

pub use types::*;

/// Borrowed reference to any AST node handed to [`walk`] visitors.
///
/// `CommandNode::Recovered` placeholders are not emitted as separate nodes;
/// the statement wrapping them is still visited.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Statement(&'a StatementNode),
    Command(&'a CommandNode),
    Word(&'a WordNode),
    WordPart(&'a WordPart),
    Redirection(&'a RedirectionNode),
    Assignment(&'a AssignmentNode),
    Arith(&'a ArithExpr),
    Cond(&'a CondExpr),
    Comment(&'a CommentNode),
}

impl<'a> NodeRef<'a> {
    pub fn span(&self) -> Span {
        match self {
            Self::Statement(n) => n.span,
            Self::Command(n) => n.span(),
            Self::Word(n) => n.span,
            Self::WordPart(n) => n.span(),
            Self::Redirection(n) => n.span,
            Self::Assignment(n) => n.span,
            Self::Arith(n) => n.span(),
            Self::Cond(n) => n.span(),
            Self::Comment(n) => n.span,
        }
    }
}

/// Walks the whole tree in source order, calling the visitor on every node.
/// Returning `false` from the visitor skips that node's children.
pub fn walk(script: &ScriptNode, f: &mut impl FnMut(NodeRef<'_>) -> bool) {
    for comment in &script.comments {
        f(NodeRef::Comment(comment));
    }
    for stmt in &script.statements {
        walk_statement(stmt, f);
    }
}

fn walk_statement(stmt: &StatementNode, f: &mut impl FnMut(NodeRef<'_>) -> bool) {
    if !f(NodeRef::Statement(stmt)) {
        return;
    }
    walk_command(&stmt.command, f);
    for redir in &stmt.redirections {
        walk_redirection(redir, f);
    }
}

fn walk_command(cmd: &CommandNode, f: &mut impl FnMut(NodeRef<'_>) -> bool) {
    if matches!(cmd, CommandNode::Recovered) {
        return;
    }
    if !f(NodeRef::Command(cmd)) {
        return;
    }
    match cmd {
        CommandNode::Simple(n) => {
            for assign in &n.assignments {
                walk_assignment(assign, f);
            }
            for word in &n.words {
                walk_word(word, f);
            }
        }
        CommandNode::Group(n) => walk_statements(&n.body, f),
        CommandNode::Subshell(n) => walk_statements(&n.body, f),
        CommandNode::If(n) => {
            for clause in &n.clauses {
                walk_statements(&clause.condition, f);
                walk_statements(&clause.body, f);
            }
            if let Some(body) = &n.else_body {
                walk_statements(body, f);
            }
        }
        CommandNode::For(n) => {
            if let Some(words) = &n.words {
                for word in words {
                    walk_word(word, f);
                }
            }
            walk_statements(&n.body, f);
        }
        CommandNode::CStyleFor(n) => {
            for expr in [&n.init, &n.condition, &n.update].into_iter().flatten() {
                walk_arith(expr, f);
            }
            walk_statements(&n.body, f);
        }
        CommandNode::While(n) => {
            walk_statements(&n.condition, f);
            walk_statements(&n.body, f);
        }
        CommandNode::Until(n) => {
            walk_statements(&n.condition, f);
            walk_statements(&n.body, f);
        }
        CommandNode::Select(n) => {
            if let Some(words) = &n.words {
                for word in words {
                    walk_word(word, f);
                }
            }
            walk_statements(&n.body, f);
        }
        CommandNode::Case(n) => {
            walk_word(&n.word, f);
            for item in &n.items {
                for pattern in &item.patterns {
                    walk_word(pattern, f);
                }
                walk_statements(&item.body, f);
            }
        }
        CommandNode::FunctionDef(n) => walk_statement(&n.body, f),
        CommandNode::Test(n) => walk_cond(&n.expression, f),
        CommandNode::Arithmetic(n) => walk_arith(&n.expression, f),
        CommandNode::Declare(n) => {
            for assign in &n.args {
                walk_assignment(assign, f);
            }
        }
        CommandNode::Let(n) => {
            for expr in &n.exprs {
                walk_arith(expr, f);
            }
        }
        CommandNode::Time(n) => {
            if let Some(stmt) = &n.statement {
                walk_statement(stmt, f);
            }
        }
        CommandNode::Coproc(n) => walk_statement(&n.statement, f),
        CommandNode::Binary(n) => {
            walk_statement(&n.left, f);
            walk_statement(&n.right, f);
        }
        CommandNode::Recovered => {}
    }
}

fn walk_statements(stmts: &[StatementNode], f: &mut impl FnMut(NodeRef<'_>) -> bool) {
    for stmt in stmts {
        walk_statement(stmt, f);
    }
}

fn walk_redirection(redir: &RedirectionNode, f: &mut impl FnMut(NodeRef<'_>) -> bool) {
    if !f(NodeRef::Redirection(redir)) {
        return;
    }
    walk_word(&redir.target, f);
    if let Some(heredoc) = &redir.heredoc {
        walk_word(&heredoc.body, f);
    }
}

fn walk_assignment(assign: &AssignmentNode, f: &mut impl FnMut(NodeRef<'_>) -> bool) {
    if !f(NodeRef::Assignment(assign)) {
        return;
    }
    if let Some(index) = &assign.index {
        walk_arith(index, f);
    }
    if let Some(value) = &assign.value {
        walk_word(value, f);
    }
    if let Some(array) = &assign.array {
        for elem in &array.elements {
            if let Some(index) = &elem.index {
                walk_arith(index, f);
            }
            walk_word(&elem.value, f);
        }
    }
}

fn walk_word(word: &WordNode, f: &mut impl FnMut(NodeRef<'_>) -> bool) {
    if !f(NodeRef::Word(word)) {
        return;
    }
    for part in &word.parts {
        walk_word_part(part, f);
    }
}

fn walk_word_part(part: &WordPart, f: &mut impl FnMut(NodeRef<'_>) -> bool) {
    if !f(NodeRef::WordPart(part)) {
        return;
    }
    match part {
        WordPart::Literal(_) | WordPart::SingleQuoted(_) | WordPart::AnsiCQuoted(_) => {}
        WordPart::DoubleQuoted(p) => {
            for part in &p.parts {
                walk_word_part(part, f);
            }
        }
        WordPart::ParameterExpansion(p) => {
            if let Some(index) = &p.index {
                walk_arith(index, f);
            }
            match &p.operation {
                Some(ParamOperation::DefaultValue(op)) => walk_word(&op.word, f),
                Some(ParamOperation::AssignDefault(op)) => walk_word(&op.word, f),
                Some(ParamOperation::ErrorIfUnset(op)) => walk_word(&op.word, f),
                Some(ParamOperation::UseAlternative(op)) => walk_word(&op.word, f),
                Some(ParamOperation::PatternRemoval(op)) => walk_word(&op.pattern, f),
                Some(ParamOperation::PatternReplacement(op)) => {
                    walk_word(&op.pattern, f);
                    if let Some(repl) = &op.replacement {
                        walk_word(repl, f);
                    }
                }
                Some(ParamOperation::CaseModification(op)) => {
                    if let Some(pattern) = &op.pattern {
                        walk_word(pattern, f);
                    }
                }
                Some(ParamOperation::Slice(op)) => {
                    walk_arith(&op.offset, f);
                    if let Some(length) = &op.length {
                        walk_arith(length, f);
                    }
                }
                Some(ParamOperation::Transform(_))
                | Some(ParamOperation::NamePrefix(_))
                | Some(ParamOperation::Keys(_))
                | None => {}
            }
        }
        WordPart::CommandSubstitution(p) => walk_statements(&p.statements, f),
        WordPart::ArithmeticExpansion(p) => walk_arith(&p.expression, f),
        WordPart::ProcessSubstitution(p) => walk_statements(&p.statements, f),
        WordPart::ExtGlob(_) => {}
        WordPart::BraceExpansion(p) => {
            for elem in &p.elements {
                walk_word(elem, f);
            }
        }
    }
}

fn walk_arith(expr: &ArithExpr, f: &mut impl FnMut(NodeRef<'_>) -> bool) {
    if !f(NodeRef::Arith(expr)) {
        return;
    }
    match expr {
        ArithExpr::Word(w) => {
            for part in &w.parts {
                walk_word_part(part, f);
            }
        }
        ArithExpr::Group(g) => walk_arith(&g.expression, f),
        ArithExpr::Unary(u) => walk_arith(&u.operand, f),
        ArithExpr::Binary(b) => {
            walk_arith(&b.left, f);
            walk_arith(&b.right, f);
        }
    }
}

fn walk_cond(expr: &CondExpr, f: &mut impl FnMut(NodeRef<'_>) -> bool) {
    if !f(NodeRef::Cond(expr)) {
        return;
    }
    match expr {
        CondExpr::Word(w) => {
            for part in &w.parts {
                walk_word_part(part, f);
            }
        }
        CondExpr::Unary(u) => walk_word(&u.operand, f),
        CondExpr::Binary(b) => {
            walk_cond(&b.left, f);
            walk_cond(&b.right, f);
        }
        CondExpr::Group(g) => walk_cond(&g.expression, f),
        CondExpr::Not(n) => walk_cond(&n.operand, f),
    }
}
