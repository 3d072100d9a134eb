//! HRL deserializer
//!
//! Parses a Text blob into triples. Tokens are whitespace-delimited;
//! `"..."` quotes a text token honouring `\\` and `\"`, `(` opens a group,
//! `;` separates clauses, `)` closes, `#name` interns a file-scoped local,
//! `raw:` followed by uppercase hex nibbles yields a raw bit-blob, and
//! `-?digits(.digits)?` yields a Natural, Integer or Float blob. Numeric
//! and textual tokens go through blob interning, so equal literals share a
//! symbol across the whole store.
//!
//! Groups parse through an explicit stack of frame records; the pending
//! unnest entity/attribute of a closing group is recorded on its parent so
//! the next parent-level token attaches through it.

use crate::task::Task;
use rustc_hash::FxHashMap;
use symvm_core::{Error, QueryMask, Result, Triple};
use symvm_vocab::{sym, Symbol};

const RAW_BEGIN: &[u8] = b"raw:";

struct GroupFrame {
    entity: Symbol,
    queue: Vec<Symbol>,
    unnest_entity: Symbol,
    unnest_attribute: Symbol,
}

impl GroupFrame {
    fn new() -> GroupFrame {
        GroupFrame {
            entity: sym::VOID,
            queue: Vec::new(),
            unnest_entity: sym::VOID,
            unnest_attribute: sym::VOID,
        }
    }
}

/// Run the Deserialize procedure against the current block (Package,
/// Input, optional Target/Output), popping the call stack on success.
pub(crate) fn run(task: &mut Task) -> Result<()> {
    let block = task.current_block();
    let store = task.store();
    let package = store.get_guaranteed(block, sym::PACKAGE)?;
    let input = store.get_guaranteed(block, sym::INPUT)?;
    if !store.blob_type_is(input, sym::TEXT) {
        return Err(Error::TypeMismatch {
            symbol: input,
            expected: sym::TEXT,
        });
    }
    let len = (store.blob_size(input) / 8) as usize;
    let mut src = store.blob_bytes(input);
    src.truncate(len);
    Deserializer {
        task,
        block,
        package,
        src,
        pos: 0,
        token_begin: 0,
        row: 1,
        column: 1,
        stack: vec![GroupFrame::new()],
        locals: FxHashMap::default(),
    }
    .parse()
}

struct Deserializer<'t, 's> {
    task: &'t mut Task<'s>,
    block: Symbol,
    package: Symbol,
    src: Vec<u8>,
    pos: usize,
    token_begin: usize,
    row: u64,
    column: u64,
    stack: Vec<GroupFrame>,
    locals: FxHashMap<Vec<u8>, Symbol>,
}

impl Deserializer<'_, '_> {
    fn fail<T>(&self, message: &'static str) -> Result<T> {
        Err(Error::Parse {
            message,
            row: self.row,
            column: self.column,
        })
    }

    fn parse(mut self) -> Result<()> {
        while self.pos < self.src.len() {
            match self.src[self.pos] {
                b'\n' => {
                    self.flush_token(false)?;
                    self.column = 0;
                    self.row += 1;
                }
                b'\t' => {
                    self.column += 3;
                    self.flush_token(false)?;
                }
                b' ' => self.flush_token(false)?,
                b'"' => {
                    self.token_begin = self.pos + 1;
                    loop {
                        let prev_not_escape = self.src[self.pos] != b'\\';
                        self.pos += 1;
                        if self.pos >= self.src.len() {
                            return self.fail("Unterminated text");
                        }
                        if prev_not_escape {
                            if self.src[self.pos] == b'\\' {
                                continue;
                            }
                            if self.src[self.pos] == b'"' {
                                break;
                            }
                        }
                    }
                    self.flush_token(true)?;
                }
                b'(' => {
                    self.flush_token(false)?;
                    self.stack.push(GroupFrame::new());
                }
                b';' => {
                    if self.stack.len() == 1 {
                        return self.fail("Semicolon outside of any brackets");
                    }
                    self.separate_tokens(true)?;
                    if self.top().unnest_entity != sym::VOID {
                        return self.fail("Unnesting failed");
                    }
                }
                b')' => {
                    if self.stack.len() == 1 {
                        return self.fail("Unmatched closing bracket");
                    }
                    self.separate_tokens(false)?;
                    if self.stack.len() == 2 {
                        self.locals.clear();
                        let closing = self.stack.last().expect("group frame");
                        if closing.entity != sym::VOID
                            && self.task.store().query_count(
                                QueryMask::MVV,
                                Triple::new(closing.entity, sym::VOID, sym::VOID),
                            ) == 0
                        {
                            return self.fail("Nothing declared");
                        }
                    }
                    if self.top().unnest_entity != sym::VOID {
                        return self.fail("Unnesting failed");
                    }
                    self.stack.pop();
                    if self.stack.len() == 1 {
                        // unnest state does not outlive the outermost group
                        let root = self.stack.last_mut().expect("root frame");
                        root.unnest_entity = sym::VOID;
                    }
                }
                _ => {}
            }
            self.column += 1;
            self.pos += 1;
        }
        self.flush_token(false)?;

        if self.stack.len() != 1 {
            return self.fail("Missing closing bracket");
        }
        if self.stack[0].unnest_entity != sym::VOID {
            return self.fail("Unnesting failed");
        }
        if self.stack[0].queue.is_empty() {
            return self.fail("Empty Input");
        }

        if let Some(output) = self.task.store().get_uncertain(self.block, sym::OUTPUT) {
            let target = self.task.target_symbol();
            self.task.store_mut().unlink_all(target, output);
            let queue = std::mem::take(&mut self.stack[0].queue);
            for value in queue {
                self.task
                    .store_mut()
                    .link(Triple::new(target, output, value));
            }
        }
        self.task.pop_call_stack();
        Ok(())
    }

    fn top(&self) -> &GroupFrame {
        self.stack.last().expect("group frame")
    }

    fn flush_token(&mut self, is_text: bool) -> Result<()> {
        if self.pos <= self.token_begin {
            self.token_begin = self.pos + 1;
            return Ok(());
        }
        let token = self.src[self.token_begin..self.pos].to_vec();
        self.token_begin = self.pos + 1;
        let symbol = if is_text {
            let text = String::from_utf8_lossy(&unescape(&token)).into_owned();
            self.task.store_mut().create_text(&text)
        } else if token[0] == b'#' {
            match self.locals.get(&token) {
                Some(&local) => local,
                None => {
                    let local = self
                        .task
                        .store_mut()
                        .create_raw(&token, token.len() as u64 * 8);
                    self.locals.insert(token, local);
                    local
                }
            }
        } else if token.len() >= RAW_BEGIN.len() && token[..RAW_BEGIN.len()] == *RAW_BEGIN {
            self.raw_token(&token[RAW_BEGIN.len()..])?
        } else {
            self.number_or_text(&token)
        };
        self.task
            .store_mut()
            .link(Triple::new(self.package, sym::HOLDS, symbol));
        self.next_symbol(self.stack.len() - 1, symbol)
    }

    fn raw_token(&mut self, nibbles: &[u8]) -> Result<Symbol> {
        if nibbles.is_empty() {
            return self.fail("Empty raw data");
        }
        let mut bytes = vec![0u8; nibbles.len().div_ceil(2)];
        for (i, &c) in nibbles.iter().enumerate() {
            let nibble = match c {
                b'0'..=b'9' => c - b'0',
                b'A'..=b'F' => c - b'A' + 0xA,
                _ => return self.fail("Non hex characters"),
            };
            if i % 2 == 0 {
                bytes[i / 2] = nibble;
            } else {
                bytes[i / 2] |= nibble << 4;
            }
        }
        Ok(self
            .task
            .store_mut()
            .create_raw(&bytes, nibbles.len() as u64 * 4))
    }

    fn number_or_text(&mut self, token: &[u8]) -> Symbol {
        let negative = token[0] == b'-';
        let digits = &token[negative as usize..];
        let mut mantissa = 0u64;
        let mut divisor = 0u64;
        let mut is_number = !digits.is_empty();
        for &c in digits {
            divisor = divisor.wrapping_mul(10);
            match c {
                b'0'..=b'9' => {
                    mantissa = mantissa.wrapping_mul(10).wrapping_add((c - b'0') as u64);
                }
                b'.' => {
                    if divisor > 0 {
                        is_number = false;
                        break;
                    }
                    divisor = 1;
                }
                _ => {
                    is_number = false;
                    break;
                }
            }
        }
        let store = self.task.store_mut();
        if is_number && divisor != 1 {
            if divisor > 0 {
                let mut value = mantissa as f64 / divisor as f64;
                if negative {
                    value = -value;
                }
                store.create_float(value)
            } else if negative {
                store.create_integer(-(mantissa as i64))
            } else {
                store.create_natural(mantissa)
            }
        } else {
            store.create_text(&String::from_utf8_lossy(token).into_owned())
        }
    }

    fn next_symbol(&mut self, frame: usize, symbol: Symbol) -> Result<()> {
        let (unnest_entity, unnest_attribute) = {
            let frame = &mut self.stack[frame];
            if frame.unnest_entity == sym::VOID {
                frame.queue.push(symbol);
                return Ok(());
            }
            let pending = (frame.unnest_entity, frame.unnest_attribute);
            frame.unnest_entity = sym::VOID;
            pending
        };
        if !self
            .task
            .store_mut()
            .link(Triple::new(unnest_entity, unnest_attribute, symbol))
        {
            return self.fail("Triple defined twice via unnesting");
        }
        Ok(())
    }

    fn separate_tokens(&mut self, semicolon: bool) -> Result<()> {
        self.flush_token(false)?;
        let top = self.stack.len() - 1;
        let parent = top - 1;
        if self.stack[top].queue.is_empty() {
            if semicolon {
                return self.fail("Pointless semicolon");
            }
            return Ok(());
        }

        if semicolon && self.stack[top].queue.len() == 1 {
            if self.stack[top].entity == sym::VOID {
                let entity = self.stack[top].queue.remove(0);
                self.stack[top].entity = entity;
                return self.next_symbol(parent, entity);
            }
            let entity = self.stack[top].entity;
            let attribute = self.stack[top].queue.remove(0);
            if !self
                .task
                .store_mut()
                .link(Triple::new(entity, attribute, entity))
            {
                return self.fail("Triple defined twice via self reference");
            }
            return Ok(());
        }

        let mut queue = std::mem::take(&mut self.stack[top].queue);
        let mut entity = self.stack[top].entity;
        if entity == sym::VOID {
            if queue.len() >= 3 {
                // an explicit clause entity; it stays local to the clause
                // but still reaches the enclosing queue
                entity = queue.remove(0);
                self.next_symbol(parent, entity)?;
            } else {
                entity = self.task.store_mut().create_symbol();
                self.stack[top].entity = entity;
                self.next_symbol(parent, entity)?;
            }
        }
        let attribute = queue.remove(0);
        {
            let parent_frame = &mut self.stack[parent];
            if semicolon {
                parent_frame.unnest_entity = sym::VOID;
            } else {
                parent_frame.unnest_entity = entity;
                parent_frame.unnest_attribute = attribute;
            }
        }
        for value in queue {
            if !self
                .task
                .store_mut()
                .link(Triple::new(entity, attribute, value))
            {
                return self.fail("Triple defined twice");
            }
        }
        Ok(())
    }
}

fn unescape(token: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(token.len());
    let mut escaped = false;
    for &c in token {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == b'\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    if escaped {
        out.push(b'\\');
    }
    out
}
