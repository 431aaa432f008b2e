use crate::VhdlGenerationOptions;

/// Accumulates rendered source text.
pub struct VhdlWriter<'a> {
    options: &'a VhdlGenerationOptions,
    out: String,
    indent: usize,
}

impl<'a> VhdlWriter<'a> {
    pub fn new(options: &'a VhdlGenerationOptions) -> Self {
        VhdlWriter {
            options,
            out: String::new(),
            indent: 0,
        }
    }

    pub fn options(&self) -> &VhdlGenerationOptions {
        self.options
    }

    pub fn identifier(&self, name: &str) -> String {
        self.options.identifier(name)
    }

    /// Write one line at the current indentation.
    pub fn line<S: AsRef<str>>(&mut self, text: S) {
        if self.options.format_code {
            for _ in 0..self.indent {
                self.out.push_str("    ");
            }
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    /// An empty line, only when formatting.
    pub fn blank(&mut self) {
        if self.options.format_code {
            self.out.push('\n');
        }
    }

    /// Write lines produced by `body` one level deeper.
    pub fn indented<F: FnOnce(&mut Self)>(&mut self, body: F) {
        self.indent += 1;
        body(self);
        self.indent -= 1;
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Nodes of the object model that render to whole lines of VHDL.
pub trait Vhdl {
    fn write_vhdl(&self, w: &mut VhdlWriter);

    fn to_vhdl(&self, options: &VhdlGenerationOptions) -> String {
        let mut w = VhdlWriter::new(options);
        self.write_vhdl(&mut w);
        w.finish()
    }
}

impl<T: Vhdl> Vhdl for [T] {
    fn write_vhdl(&self, w: &mut VhdlWriter) {
        for item in self {
            item.write_vhdl(w);
        }
    }
}
