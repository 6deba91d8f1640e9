pub mod overlay {
    pub mod domain {
        pub mod composite_style;
        pub mod label_metrics;
        pub mod overlay_compositor;
        pub mod placement;
        pub mod text_renderer;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod pipeline_logger;
    pub mod watermark_video_use_case;
}

pub mod shared {
    pub mod constants;
    pub mod error;
    pub mod frame;
    pub mod video_metadata;
}

pub mod video {
    pub mod domain {
        pub mod video_reader;
        pub mod video_writer;
    }
    pub mod infrastructure {
        pub mod ffmpeg_reader;
        pub mod ffmpeg_writer;
    }
}
