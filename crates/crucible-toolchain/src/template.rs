//! Lowers a command template (a vector of tokens, some containing
//! placeholders) into a concrete argument vector.
//!
//! Tokens that are *exactly* `[flags]` or `[in]` expand to zero or more
//! tokens (the flags/input lists are spliced in, one argv entry each, not
//! substring-replaced — a compiler or linker must see each input path as
//! its own argument, not one token containing embedded spaces); every other
//! placeholder (`[out]`, `[path]`, `[def]`, `[version]`) is replaced as a
//! substring within its token, since templates such as `/Fe[out]` or
//! `-D[def]` glue the placeholder onto adjacent literal text.

pub struct Substitutions<'a> {
    pub flags: &'a [String],
    pub input: &'a [String],
    pub output: Option<&'a str>,
    pub path: Option<&'a str>,
    pub def: Option<&'a str>,
    pub version: Option<&'a str>,
}

impl<'a> Substitutions<'a> {
    pub fn new(flags: &'a [String]) -> Self {
        Self {
            flags,
            input: &[],
            output: None,
            path: None,
            def: None,
            version: None,
        }
    }

    pub fn input(mut self, v: &'a [String]) -> Self {
        self.input = v;
        self
    }

    pub fn output(mut self, v: &'a str) -> Self {
        self.output = Some(v);
        self
    }

    pub fn path(mut self, v: &'a str) -> Self {
        self.path = Some(v);
        self
    }

    pub fn def(mut self, v: &'a str) -> Self {
        self.def = Some(v);
        self
    }

    pub fn version(mut self, v: &'a str) -> Self {
        self.version = Some(v);
        self
    }
}

pub fn lower(template: &[String], subs: &Substitutions<'_>) -> Vec<String> {
    let mut out = Vec::with_capacity(template.len());
    for token in template {
        if token == "[flags]" {
            out.extend(subs.flags.iter().cloned());
            continue;
        }
        if token == "[in]" {
            out.extend(subs.input.iter().cloned());
            continue;
        }
        let mut rendered = token.clone();
        if let Some(v) = subs.output {
            rendered = rendered.replace("[out]", v);
        }
        if let Some(v) = subs.path {
            rendered = rendered.replace("[path]", v);
        }
        if let Some(v) = subs.def {
            rendered = rendered.replace("[def]", v);
        }
        if let Some(v) = subs.version {
            rendered = rendered.replace("[version]", v);
        }
        out.push(rendered);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_token_splices_list() {
        let flags = vec!["-Wall".to_string(), "-O2".to_string()];
        let input = vec!["a.cpp".to_string()];
        let template = vec!["[flags]".to_string(), "-c".to_string(), "[in]".to_string(), "-o[out]".to_string()];
        let subs = Substitutions::new(&flags).input(&input).output("a.o");
        assert_eq!(lower(&template, &subs), vec!["-Wall", "-O2", "-c", "a.cpp", "-oa.o"]);
    }

    #[test]
    fn glued_placeholder_is_substring_replaced() {
        let flags: Vec<String> = vec![];
        let template = vec!["/Fe[out]".to_string()];
        let subs = Substitutions::new(&flags).output("app.exe");
        assert_eq!(lower(&template, &subs), vec!["/Feapp.exe"]);
    }

    #[test]
    fn in_token_splices_each_input_as_its_own_argv_entry() {
        let flags: Vec<String> = vec![];
        let inputs = vec!["foo.o".to_string(), "bar.o".to_string()];
        let template = vec!["[in]".to_string(), "-o".to_string(), "[out]".to_string()];
        let subs = Substitutions::new(&flags).input(&inputs).output("app");
        assert_eq!(lower(&template, &subs), vec!["foo.o", "bar.o", "-o", "app"]);
    }
}
