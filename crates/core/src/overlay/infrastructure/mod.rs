pub mod font_resolver;
pub mod fontdue_text_renderer;
