//! 지원 언어 목록, 실행 서비스 버전, 시작 코드

pub const DEFAULT_LANGUAGE: &str = "javascript";

/// (언어 ID, 실행 런타임 버전)
pub const LANGUAGE_VERSIONS: &[(&str, &str)] = &[
    ("javascript", "18.15.0"),
    ("typescript", "5.0.3"),
    ("python", "3.10.0"),
    ("java", "15.0.2"),
    ("csharp", "6.12.0"),
    ("php", "8.2.3"),
    ("cpp", "10.2.0"),
];

const SNIPPETS: &[(&str, &str)] = &[
    (
        "javascript",
        "console.log(\"Hello, World!\");\n\nfunction sayHello() {\n  return \"Hello, World!\";\n}\n\nsayHello();",
    ),
    (
        "typescript",
        "console.log(\"Hello, World!\");\n\nfunction greetUser(name: string): string {\n  return `Hello, ${name}!`;\n}\n\nconst message: string = greetUser(\"World\");\nconsole.log(message);",
    ),
    (
        "python",
        "print(\"Hello, World!\")\n\ndef say_hello(name=\"World\"):\n    return f\"Hello, {name}!\"\n\nmessage = say_hello()\nprint(message)",
    ),
    (
        "java",
        "public class HelloWorld {\n    public static void main(String[] args) {\n        System.out.println(\"Hello, World!\");\n    }\n}",
    ),
    (
        "csharp",
        "using System;\n\npublic class HelloWorld\n{\n    public static void Main()\n    {\n        Console.WriteLine(\"Hello, World!\");\n    }\n}",
    ),
    (
        "php",
        "<?php\necho \"Hello, World!\";\n\nfunction sayHello($name = \"World\") {\n    return \"Hello, \" . $name . \"!\";\n}\n\necho sayHello();\n?>",
    ),
    (
        "cpp",
        "#include <iostream>\n\nint main() {\n    std::cout << \"Hello, World!\" << std::endl;\n    return 0;\n}",
    ),
];

/// 실행 서비스에 보낼 런타임 버전
pub fn version_for(language: &str) -> Option<&'static str> {
    LANGUAGE_VERSIONS
        .iter()
        .find(|(id, _)| *id == language)
        .map(|(_, version)| *version)
}

pub fn snippet_for(language: &str) -> Option<&'static str> {
    SNIPPETS
        .iter()
        .find(|(id, _)| *id == language)
        .map(|(_, snippet)| *snippet)
}

/// 사용자가 손대지 않은 버퍼인지 (비어 있거나 시작 코드 그대로)
pub fn is_untouched(text: &str) -> bool {
    text.trim().is_empty() || SNIPPETS.iter().any(|(_, snippet)| *snippet == text)
}
