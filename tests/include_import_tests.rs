//! `xsl:include`, `xsl:import`, `xsl:apply-imports`, and `document()`:
//! behaviors that need real files on disk.

use std::fs;
use std::path::PathBuf;

use stilo::{dom, StylesheetOptions};

/// A scratch directory removed on drop.
struct Scratch {
    dir: PathBuf,
}

impl Scratch {
    fn new(name: &str) -> Scratch {
        let dir = std::env::temp_dir().join(format!("stilo-test-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).expect("create scratch dir");
        Scratch { dir }
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.join(name);
        fs::write(&path, content).expect("write scratch file");
        path
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn run(stylesheet_path: &PathBuf, xml: &str) -> String {
    let style = stilo::xslt::parse_stylesheet_file(stylesheet_path).expect("stylesheet compiles");
    let input = dom::parse_str(xml, None).expect("input parses");
    style
        .process(&input, &StylesheetOptions::default())
        .expect("transformation runs")
}

fn body(output: &str) -> &str {
    let rest = match output.find("?>\n") {
        Some(i) => &output[i + 3..],
        None => output,
    };
    rest.trim_end_matches('\n')
}

#[test]
fn include_splices_at_equal_precedence() {
    let scratch = Scratch::new("include");
    scratch.write(
        "part.xsl",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:template match="b">included-b</xsl:template>
        </xsl:stylesheet>"#,
    );
    let main = scratch.write(
        "main.xsl",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:include href="part.xsl"/>
            <xsl:template match="/"><xsl:apply-templates/></xsl:template>
        </xsl:stylesheet>"#,
    );
    assert_eq!(body(&run(&main, "<b/>")), "included-b");
}

#[test]
fn included_template_competes_at_equal_precedence() {
    // the included template has the same default priority; it is spliced
    // before the including stylesheet's own rule, which therefore wins as
    // the later declaration
    let scratch = Scratch::new("include-priority");
    scratch.write(
        "part.xsl",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:template match="b">from-include</xsl:template>
        </xsl:stylesheet>"#,
    );
    let main = scratch.write(
        "main.xsl",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:include href="part.xsl"/>
            <xsl:template match="/"><xsl:apply-templates/></xsl:template>
            <xsl:template match="b">from-main</xsl:template>
        </xsl:stylesheet>"#,
    );
    assert_eq!(body(&run(&main, "<b/>")), "from-main");
}

#[test]
fn duplicate_include_is_fatal() {
    let scratch = Scratch::new("dup-include");
    scratch.write(
        "part.xsl",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:template match="b">x</xsl:template>
        </xsl:stylesheet>"#,
    );
    let main = scratch.write(
        "main.xsl",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:include href="part.xsl"/>
            <xsl:include href="part.xsl"/>
        </xsl:stylesheet>"#,
    );
    assert!(stilo::xslt::parse_stylesheet_file(&main).is_err());
}

#[test]
fn importing_stylesheet_outranks_import() {
    let scratch = Scratch::new("import");
    scratch.write(
        "base.xsl",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:template match="b" priority="10">base-b</xsl:template>
            <xsl:template match="c">base-c</xsl:template>
        </xsl:stylesheet>"#,
    );
    let main = scratch.write(
        "main.xsl",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:import href="base.xsl"/>
            <xsl:template match="/"><xsl:apply-templates/></xsl:template>
            <xsl:template match="b">main-b</xsl:template>
        </xsl:stylesheet>"#,
    );
    // the importer wins for b despite the import's higher priority;
    // the import is consulted for c, which the importer never matches
    assert_eq!(body(&run(&main, "<b/>")), "main-b");
    assert_eq!(body(&run(&main, "<c/>")), "base-c");
}

#[test]
fn apply_imports_dispatches_into_the_import_chain() {
    let scratch = Scratch::new("apply-imports");
    scratch.write(
        "base.xsl",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:template match="b"><base><xsl:value-of select="."/></base></xsl:template>
        </xsl:stylesheet>"#,
    );
    let main = scratch.write(
        "main.xsl",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:import href="base.xsl"/>
            <xsl:template match="/"><xsl:apply-templates/></xsl:template>
            <xsl:template match="b"><wrapped><xsl:apply-imports/></wrapped></xsl:template>
        </xsl:stylesheet>"#,
    );
    assert_eq!(
        body(&run(&main, "<b>text</b>")),
        "<wrapped><base>text</base></wrapped>"
    );
}

#[test]
fn document_function_loads_relative_to_stylesheet() {
    let scratch = Scratch::new("document-fn");
    scratch.write("extra.xml", "<extra><v>42</v></extra>");
    let main = scratch.write(
        "main.xsl",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:template match="/">
                <got><xsl:value-of select="document('extra.xml')//v"/></got>
            </xsl:template>
        </xsl:stylesheet>"#,
    );
    assert_eq!(body(&run(&main, "<d/>")), "<got>42</got>");
}

#[test]
fn imported_global_variable_is_overridden() {
    let scratch = Scratch::new("import-globals");
    scratch.write(
        "base.xsl",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:variable name="who" select="'base'"/>
            <xsl:variable name="only" select="'import-only'"/>
        </xsl:stylesheet>"#,
    );
    let main = scratch.write(
        "main.xsl",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
            <xsl:import href="base.xsl"/>
            <xsl:variable name="who" select="'main'"/>
            <xsl:template match="/">
                <r a="{$who}" b="{$only}"/>
            </xsl:template>
        </xsl:stylesheet>"#,
    );
    assert_eq!(body(&run(&main, "<d/>")), r#"<r a="main" b="import-only"/>"#);
}
