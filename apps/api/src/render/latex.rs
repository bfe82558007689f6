//! Résumé → LaTeX source.
//!
//! Pure string building; no I/O. All user-supplied text passes through
//! [`escape_text`] (or [`escape_url`] for link targets) before it reaches the
//! document, so payload content can never inject compiler commands.

use serde_json::Value;
use thiserror::Error;

use crate::models::resume::{Contact, Education, Experience, Project, ResumeDocument, Skill};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid resume payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

const PREAMBLE: &str = r"\documentclass[letterpaper,11pt]{article}

\usepackage{latexsym}
\usepackage[empty]{fullpage}
\usepackage{titlesec}
\usepackage{marvosym}
\usepackage[usenames,dvipsnames]{color}
\usepackage{verbatim}
\usepackage{enumitem}
\usepackage[hidelinks]{hyperref}
\usepackage{fancyhdr}
\usepackage[utf8]{inputenc}
\usepackage[english,russian]{babel}
\usepackage{tabularx}
\input{glyphtounicode}

\pagestyle{fancy}
\fancyhf{}
\fancyfoot{}
\renewcommand{\headrulewidth}{0pt}
\renewcommand{\footrulewidth}{0pt}

\addtolength{\oddsidemargin}{-0.5in}
\addtolength{\evensidemargin}{-0.5in}
\addtolength{\textwidth}{1in}
\addtolength{\topmargin}{-.5in}
\addtolength{\textheight}{1.0in}

\urlstyle{same}
\raggedbottom
\raggedright
\setlength{\tabcolsep}{0in}

\titleformat{\section}{
  \vspace{-4pt}\scshape\raggedright\large
}{}{0em}{}[\color{black}\titlerule \vspace{-5pt}]

\pdfgentounicode=1

\newcommand{\resumeItem}[1]{
  \item\small{
    {#1 \vspace{-2pt}}
  }
}

\newcommand{\resumeSubheading}[4]{
  \vspace{-2pt}\item
    \begin{tabular*}{0.97\textwidth}[t]{l@{\extracolsep{\fill}}r}
      \textbf{#1} & #2 \\
      \textit{\small#3} & \textit{\small #4} \\
    \end{tabular*}\vspace{-7pt}
}

\newcommand{\resumeProjectHeading}[2]{
    \item
    \begin{tabular*}{0.97\textwidth}{l@{\extracolsep{\fill}}r}
      \small#1 & #2 \\
    \end{tabular*}\vspace{-7pt}
}

\renewcommand\labelitemii{$\vcenter{\hbox{\tiny$\bullet$}}$}

\newcommand{\resumeSubHeadingListStart}{\begin{itemize}[leftmargin=0.15in, label={}]}
\newcommand{\resumeSubHeadingListEnd}{\end{itemize}}
\newcommand{\resumeItemListStart}{\begin{itemize}}
\newcommand{\resumeItemListEnd}{\end{itemize}\vspace{-5pt}}

\begin{document}
";

const POSTAMBLE: &str = "\n\\end{document}\n";

/// Localized section headings.
struct SectionTitles {
    education: &'static str,
    experience: &'static str,
    projects: &'static str,
    skills: &'static str,
}

impl SectionTitles {
    fn for_language(is_english: bool) -> Self {
        if is_english {
            SectionTitles {
                education: "Education",
                experience: "Experience",
                projects: "Projects",
                skills: "Technical Skills",
            }
        } else {
            SectionTitles {
                education: "Образование",
                experience: "Опыт работы",
                projects: "Проекты",
                skills: "Технические навыки",
            }
        }
    }
}

/// Deserializes a raw request body and renders it.
pub fn render_resume_value(payload: Value) -> Result<String, RenderError> {
    let document: ResumeDocument = serde_json::from_value(payload)?;
    Ok(render_resume(&document))
}

pub fn render_resume(doc: &ResumeDocument) -> String {
    let titles = SectionTitles::for_language(doc.is_english);
    let mut out = String::from(PREAMBLE);

    push_heading(&mut out, &doc.contact);
    push_education(&mut out, titles.education, &doc.education);
    push_experience(&mut out, titles.experience, &doc.experience);
    push_projects(&mut out, titles.projects, &doc.projects);
    push_skills(&mut out, titles.skills, &doc.skills);

    out.push_str(POSTAMBLE);
    out
}

fn push_heading(out: &mut String, contact: &Contact) {
    let mut links = Vec::new();
    if !contact.phone.is_empty() {
        links.push(format!(r"\small {}", escape_text(&contact.phone)));
    }
    if !contact.email.is_empty() {
        links.push(format!(
            r"\href{{mailto:{}}}{{\underline{{{}}}}}",
            escape_url(&contact.email),
            escape_text(&contact.email)
        ));
    }
    if !contact.github.is_empty() {
        links.push(format!(
            r"\href{{{}}}{{\underline{{{}}}}}",
            escape_url(&contact.github),
            escape_text(&contact.github)
        ));
    }

    if contact.name.is_empty() && links.is_empty() {
        return;
    }

    out.push_str("\n\\begin{center}\n");
    if !contact.name.is_empty() {
        out.push_str(&format!(
            "\\textbf{{\\Huge \\scshape {}}} \\\\ \\vspace{{1pt}}\n",
            escape_text(&contact.name)
        ));
    }
    if !links.is_empty() {
        out.push_str(&links.join(r" $|$ "));
        out.push('\n');
    }
    out.push_str("\\end{center}\n");
}

fn push_section_start(out: &mut String, title: &str) {
    out.push_str(&format!(
        "\n\\section{{{title}}}\n\\resumeSubHeadingListStart\n"
    ));
}

fn push_subheading(out: &mut String, fields: [&str; 4]) {
    let [a, b, c, d] = fields.map(escape_text);
    out.push_str(&format!(
        "\\resumeSubheading\n  {{{a}}}{{{b}}}\n  {{{c}}}{{{d}}}\n"
    ));
}

fn push_items(out: &mut String, items: &[String]) {
    // An itemize with no \item does not compile.
    if items.iter().all(|i| i.is_empty()) {
        return;
    }
    out.push_str("\\resumeItemListStart\n");
    for item in items.iter().filter(|i| !i.is_empty()) {
        out.push_str(&format!("\\resumeItem{{{}}}\n", escape_text(item)));
    }
    out.push_str("\\resumeItemListEnd\n");
}

fn push_education(out: &mut String, title: &str, entries: &[Education]) {
    let entries: Vec<_> = entries
        .iter()
        .filter(|e| !all_empty(&[&e.title, &e.subtitle, &e.degree, &e.date_range]))
        .collect();
    if entries.is_empty() {
        return;
    }
    push_section_start(out, title);
    for e in entries {
        push_subheading(out, [&e.title, &e.date_range, &e.subtitle, &e.degree]);
    }
    out.push_str("\\resumeSubHeadingListEnd\n");
}

fn push_experience(out: &mut String, title: &str, entries: &[Experience]) {
    let entries: Vec<_> = entries
        .iter()
        .filter(|e| !all_empty(&[&e.position, &e.date_range, &e.company, &e.location]))
        .collect();
    if entries.is_empty() {
        return;
    }
    push_section_start(out, title);
    for e in entries {
        push_subheading(out, [&e.position, &e.date_range, &e.company, &e.location]);
        push_items(out, &e.responsibilities);
    }
    out.push_str("\\resumeSubHeadingListEnd\n");
}

fn push_projects(out: &mut String, title: &str, entries: &[Project]) {
    let entries: Vec<_> = entries
        .iter()
        .filter(|p| !all_empty(&[&p.title, &p.description, &p.date_range]))
        .collect();
    if entries.is_empty() {
        return;
    }
    push_section_start(out, title);
    for p in entries {
        out.push_str(&format!(
            "\\resumeProjectHeading\n    {{\\textbf{{{}}} $|$ \\emph{{{}}}}}{{{}}}\n",
            escape_text(&p.title),
            escape_text(&p.description),
            escape_text(&p.date_range)
        ));
        push_items(out, &p.descriptions);
    }
    out.push_str("\\resumeSubHeadingListEnd\n");
}

fn push_skills(out: &mut String, title: &str, entries: &[Skill]) {
    let entries: Vec<_> = entries
        .iter()
        .filter(|s| !all_empty(&[&s.title, &s.description]))
        .collect();
    if entries.is_empty() {
        return;
    }
    out.push_str(&format!(
        "\n\\section{{{title}}}\n\\begin{{itemize}}[leftmargin=0.15in, label={{}}]\n"
    ));
    for s in entries {
        out.push_str(&format!(
            "\\item \\small{{\\textbf{{{}}}{{: {}}}}}\n",
            escape_text(&s.title),
            escape_text(&s.description)
        ));
    }
    out.push_str("\\end{itemize}\n");
}

fn all_empty(fields: &[&String]) -> bool {
    fields.iter().all(|f| f.is_empty())
}

/// Escapes characters that are special in LaTeX body text.
pub fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str(r"\textbackslash{}"),
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Escapes a link target for `\href`, which tolerates most URL characters.
pub fn escape_url(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str(r"\%5C"),
            '%' | '#' | '{' | '}' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}
