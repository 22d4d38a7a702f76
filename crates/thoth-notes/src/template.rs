//! The one Jinja-style template C7 renders against (§4.7). Kept as a single
//! embedded default rather than a file on disk — "reproducing any specific
//! vault layout" is an explicit non-goal, so there's no on-disk convention
//! to load from yet.

pub const NOTE_TEMPLATE_NAME: &str = "note.md.jinja";

pub const DEFAULT_NOTE_TEMPLATE: &str = r#"---
title: "{{ title }}"
authors: {{ authors }}
year: {{ year }}
doi: {{ doi }}
journal: {{ journal }}
tags: {{ tags }}
pdf: "{{ pdf_link }}"
---

# {{ title }}

## Summary

{{ summary }}

## Key Points

{% for point in key_points -%}
- {{ point }}
{% endfor %}
## Abstract

{{ abstract_text }}

## Methodology

{{ methodology }}

## Results

{{ results }}

## Limitations

{{ limitations }}

## Related Work

{{ related_work }}
{% for ext in extensions %}
## {{ ext.title }}

{{ ext.value }}
{% endfor %}
## Citations ({{ citations | length }})

{% for c in citations -%}
- **[{{ c.number }}]** {{ c.formatted }}{% if c.link %} ([note]({{ c.link }})){% endif %}
{% endfor %}"#;
